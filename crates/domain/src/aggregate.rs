//! Core aggregate trait and the bookkeeping every aggregate carries.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::event::{DomainEvent, PendingEvent};

/// Identity, version and pending-event buffer of an aggregate.
///
/// The pending buffer is owned by the aggregate until the repository has
/// appended its contents; it is never part of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AggregateCore<E> {
    id: AggregateId,
    version: Version,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pending: Vec<PendingEvent<E>>,
}

impl<E> AggregateCore<E> {
    /// Creates the zero-state core: version 0, no history.
    pub fn new(id: AggregateId) -> Self {
        Self {
            id,
            version: Version::initial(),
            created_at: None,
            updated_at: None,
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Events recorded since the last successful save, oldest first.
    pub fn pending_events(&self) -> &[PendingEvent<E>] {
        &self.pending
    }

    /// Drops the pending buffer once its events are durable.
    pub(crate) fn clear_pending_events(&mut self) {
        self.pending.clear();
    }

    fn advance(&mut self, version: Version, at: DateTime<Utc>) {
        self.version = version;
        if self.created_at.is_none() {
            self.created_at = Some(at);
        }
        self.updated_at = Some(at);
    }

    fn record(&mut self, pending: PendingEvent<E>) {
        let at = pending.occurred_on;
        self.pending.push(pending);
        self.advance(self.version.next(), at);
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is a consistency boundary whose state changes are expressed
/// as an ordered sequence of domain events. Command methods validate their
/// input against the current state and then call [`Aggregate::apply`]; they
/// never touch state directly. [`Aggregate::when`] holds the state
/// transition and is shared by new events and replayed ones.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors command methods can produce.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the aggregate type name, stored with snapshots.
    fn aggregate_type() -> &'static str;

    /// Returns the zero-state aggregate (version 0) for `id`.
    fn new(id: AggregateId) -> Self;

    fn core(&self) -> &AggregateCore<Self::Event>;

    fn core_mut(&mut self) -> &mut AggregateCore<Self::Event>;

    /// Applies an event to the aggregate's own fields.
    ///
    /// This method must be pure and deterministic and must not fail:
    /// events represent facts that have already been decided.
    fn when(&mut self, event: &Self::Event);

    fn id(&self) -> AggregateId {
        self.core().id()
    }

    fn version(&self) -> Version {
        self.core().version()
    }

    /// Returns true if no event has been applied yet.
    fn is_new(&self) -> bool {
        self.version() == Version::initial()
    }

    /// Records a new event: updates state, buffers the event, and bumps the
    /// version by one.
    fn apply(&mut self, event: Self::Event) {
        self.when(&event);
        self.core_mut().record(PendingEvent::new(event));
    }

    /// Reconstructs state from a persisted event without buffering it.
    fn replay(&mut self, event: &Self::Event, version: Version, occurred_on: DateTime<Utc>) {
        self.when(event);
        self.core_mut().advance(version, occurred_on);
    }
}
