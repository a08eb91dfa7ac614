use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AggregateId;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version number of an aggregate stream, used for optimistic concurrency control.
///
/// A stream with no events is at version 0. The first event is stored at
/// version 1 and every following event increments the version by exactly 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a stream with no history.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1), carried by the creation event.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns this version advanced by `count` events.
    pub fn advance_by(&self, count: usize) -> Self {
        Self(self.0 + count as i64)
    }

    /// Returns the version `count` events before this one, saturating at 0.
    pub fn rewind_by(&self, count: usize) -> Self {
        Self((self.0 - count as i64).max(0))
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event produced by an aggregate that has not been persisted yet.
///
/// It carries no version: the store assigns `expected_version + index + 1`
/// to each event of a batch when it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The type discriminator (e.g. "TankCreated").
    pub event_type: String,

    /// When the event was produced. Never used for ordering.
    pub occurred_on: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl NewEvent {
    /// Creates a new event with a fresh ID, stamped with the current time.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            occurred_on: Utc::now(),
            payload,
        }
    }

    /// Creates a new event from a serializable payload.
    pub fn from_payload<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type, serde_json::to_value(payload)?))
    }

    /// Overrides the event ID.
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    /// Overrides the production timestamp.
    pub fn occurred_on(mut self, occurred_on: DateTime<Utc>) -> Self {
        self.occurred_on = occurred_on;
        self
    }
}

/// The durable form of an event.
///
/// `(aggregate_id, version)` is unique across the store: it is both the
/// optimistic-concurrency token and the replay sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique identifier for this event.
    pub id: EventId,

    /// The stream this event belongs to.
    pub aggregate_id: AggregateId,

    /// The type discriminator.
    pub event_type: String,

    /// The serialized payload.
    pub payload: serde_json::Value,

    /// The version of the aggregate after this event.
    pub version: Version,

    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
}

impl StoredEvent {
    /// Stamps a new event with its stream and assigned version.
    pub fn from_new(aggregate_id: AggregateId, version: Version, event: NewEvent) -> Self {
        Self {
            id: event.event_id,
            aggregate_id,
            event_type: event.event_type,
            payload: event.payload,
            version,
            timestamp: event.occurred_on,
        }
    }
}
