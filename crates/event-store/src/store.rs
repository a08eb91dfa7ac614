use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventStoreError, NewEvent, Result, Snapshot, StoredEvent, Version};

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StoredEvent>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store is an append-only log of events per aggregate plus a
/// snapshot cache. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events to an aggregate's stream.
    ///
    /// Event `i` of the batch is stored at `expected_version + i + 1`.
    /// The batch is atomic: either every event is committed or none is.
    /// Fails with `ConcurrencyConflict` if the stream's current version is
    /// not `expected_version` at commit time.
    ///
    /// Returns the events as they were stored.
    async fn save_events(
        &self,
        aggregate_id: AggregateId,
        events: Vec<NewEvent>,
        expected_version: Version,
    ) -> Result<Vec<StoredEvent>>;

    /// Retrieves the events of an aggregate with `version > from_version`,
    /// in ascending version order.
    async fn get_events(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<StoredEvent>>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Streams every event in the store.
    ///
    /// Events of one aggregate come in ascending version order; there is no
    /// ordering guarantee across aggregates.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Saves a snapshot, replacing any existing snapshot for the aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Retrieves the snapshot for an aggregate, if one exists.
    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Retrieves an aggregate's full history.
    async fn get_all_events(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>> {
        self.get_events(aggregate_id, Version::initial()).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads what is needed to rehydrate an aggregate.
    ///
    /// If a snapshot exists, returns it together with the events after its
    /// version. Otherwise returns None and the full history.
    async fn load_stream(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<StoredEvent>)> {
        match self.get_snapshot(aggregate_id).await? {
            Some(snapshot) => {
                let events = self.get_events(aggregate_id, snapshot.version).await?;
                Ok((Some(snapshot), events))
            }
            None => {
                let events = self.get_all_events(aggregate_id).await?;
                Ok((None, events))
            }
        }
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before appending.
pub fn validate_events_for_append(events: &[NewEvent], expected_version: Version) -> Result<()> {
    if events.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    }

    if expected_version < Version::initial() {
        return Err(EventStoreError::InvalidAppend(format!(
            "expected version must not be negative, got {expected_version}"
        )));
    }

    if let Some(event) = events.iter().find(|e| e.event_type.is_empty()) {
        return Err(EventStoreError::InvalidAppend(format!(
            "event {} has an empty event type",
            event.event_id
        )));
    }

    Ok(())
}

/// Stamps a validated batch with consecutive versions after `expected_version`.
pub fn assign_versions(
    aggregate_id: AggregateId,
    events: Vec<NewEvent>,
    expected_version: Version,
) -> Vec<StoredEvent> {
    events
        .into_iter()
        .enumerate()
        .map(|(index, event)| {
            StoredEvent::from_new(aggregate_id, expected_version.advance_by(index + 1), event)
        })
        .collect()
}
