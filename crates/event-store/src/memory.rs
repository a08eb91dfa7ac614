use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventStoreError, NewEvent, Result, Snapshot, StoredEvent, Version,
    store::{EventStore, EventStream, assign_versions, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    /// Every event in commit order.
    events: Vec<StoredEvent>,
    /// Current version per stream.
    heads: HashMap<AggregateId, Version>,
}

/// In-memory event store implementation for tests and local runs.
///
/// The version check and the write happen under a single write lock, which
/// gives the same all-or-nothing, one-winner semantics as the unique
/// `(aggregate_id, version)` constraint of the PostgreSQL store.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Clears all events and snapshots.
    pub async fn clear(&self) {
        let mut log = self.log.write().await;
        log.events.clear();
        log.heads.clear();
        self.snapshots.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save_events(
        &self,
        aggregate_id: AggregateId,
        events: Vec<NewEvent>,
        expected_version: Version,
    ) -> Result<Vec<StoredEvent>> {
        validate_events_for_append(&events, expected_version)?;

        let mut log = self.log.write().await;

        let current_version = log
            .heads
            .get(&aggregate_id)
            .copied()
            .unwrap_or(Version::initial());

        if current_version != expected_version {
            metrics::counter!("event_store_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let stored = assign_versions(aggregate_id, events, expected_version);
        if let Some(last) = stored.last() {
            log.heads.insert(aggregate_id, last.version);
        }
        log.events.extend(stored.iter().cloned());

        metrics::counter!("event_store_events_appended_total").increment(stored.len() as u64);
        Ok(stored)
    }

    async fn get_events(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<StoredEvent>> {
        let log = self.log.read().await;
        let mut events: Vec<_> = log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version > from_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.heads.get(&aggregate_id).copied())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.log.read().await.events.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let stored_version = self
            .log
            .read()
            .await
            .heads
            .get(&snapshot.aggregate_id)
            .copied()
            .unwrap_or(Version::initial());

        if snapshot.version > stored_version {
            return Err(EventStoreError::InvalidSnapshot {
                aggregate_id: snapshot.aggregate_id,
                snapshot_version: snapshot.version,
                stored_version,
            });
        }

        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&aggregate_id).cloned())
    }
}
