//! Core projection trait, position tracking and per-row version checks.

use async_trait::async_trait;
use domain::{DomainEvent, TankEvent};
use event_store::{StoredEvent, Version};

use crate::{ProjectionError, Result};

/// Tracks how many events a projection has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Number of events applied by this projection.
    pub events_processed: u64,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self {
            events_processed: 0,
        }
    }

    /// Advances the position by one event.
    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// What a projection did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The read model was updated.
    Applied,

    /// Nothing to do: the event was already applied, or is not relevant to
    /// this projection.
    Skipped,

    /// Events between `last_applied` and the delivered event are missing.
    /// Nothing was changed.
    Gap { last_applied: Version },
}

/// Result of comparing an incoming event with the last version applied to
/// a read-model row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    Apply,
    Duplicate,
    Gap,
}

/// Compares an incoming event version with the row's version. A missing row
/// counts as version 0.
pub fn check_version(last_applied: Version, incoming: Version) -> VersionCheck {
    if incoming <= last_applied {
        VersionCheck::Duplicate
    } else if incoming == last_applied.next() {
        VersionCheck::Apply
    } else {
        VersionCheck::Gap
    }
}

/// A projection that processes events and updates a read model.
///
/// Delivery is at-least-once, so `handle` must be idempotent: an event at or
/// below the version already applied for its aggregate is skipped, and an
/// event further ahead is reported as a gap instead of being applied.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &StoredEvent) -> Result<ApplyOutcome>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}

/// Decodes a stored event as a tank event.
///
/// Returns None for event types the tank registry does not know.
pub(crate) fn decode_tank_event(event: &StoredEvent) -> Result<Option<TankEvent>> {
    let registry = TankEvent::registry();
    if !registry.contains(&event.event_type) {
        return Ok(None);
    }

    registry
        .decode(&event.event_type, event.payload.clone())
        .map(Some)
        .map_err(|source| ProjectionError::Decode {
            aggregate_id: event.aggregate_id,
            version: event.version,
            event_type: event.event_type.clone(),
            source,
        })
}
