//! Loading aggregates from, and committing them to, an event store.

use std::marker::PhantomData;
use std::sync::Arc;

use common::AggregateId;
use event_store::{EventStore, EventStoreExt, EventSubscriber, Snapshot, StoredEvent, Version};

use crate::aggregate::Aggregate;
use crate::command::CommandResult;
use crate::error::DomainError;
use crate::event::DomainEvent;

/// Tuning knobs for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Take a snapshot each time a commit crosses a multiple of this many
    /// versions. Zero disables snapshots.
    pub snapshot_interval: u64,

    /// Total load-mutate-save attempts before a conflict is surfaced.
    pub max_attempts: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 50,
            max_attempts: 3,
        }
    }
}

/// Single entry point for "give me the current aggregate" and "persist what
/// changed".
///
/// Committed events are handed to every registered [`EventSubscriber`] after
/// the append succeeds.
pub struct Repository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    config: RepositoryConfig,
    subscribers: Vec<Arc<dyn EventSubscriber>>,
    _phantom: PhantomData<A>,
}

impl<S, A> Repository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a repository with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    pub fn with_config(store: S, config: RepositoryConfig) -> Self {
        Self {
            store,
            config,
            subscribers: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Registers a subscriber for committed events.
    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> RepositoryConfig {
        self.config
    }

    /// Loads an aggregate, failing with `AggregateNotFound` if it has no history.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        self.load_existing(aggregate_id)
            .await?
            .ok_or(DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            })
    }

    /// Loads an aggregate, returning None if it has no history.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.rehydrate(aggregate_id).await?;
        if aggregate.is_new() {
            Ok(None)
        } else {
            Ok(Some(aggregate))
        }
    }

    /// Rebuilds an aggregate from its snapshot (if any) plus the events after
    /// it. An aggregate with no history comes back in its zero state.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn rehydrate(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_stream(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => Self::restore_snapshot(aggregate_id, snapshot)?,
            None => A::new(aggregate_id),
        };
        Self::replay_onto(&mut aggregate, events)?;

        Ok(aggregate)
    }

    /// Rebuilds an aggregate from version 0, ignoring any snapshot.
    pub async fn replay_from_scratch(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_all_events(aggregate_id).await?;
        let mut aggregate = A::new(aggregate_id);
        Self::replay_onto(&mut aggregate, events)?;
        Ok(aggregate)
    }

    /// Replays the full history and stores a fresh snapshot of the result.
    ///
    /// Returns the snapshot version, or None if the aggregate has no history.
    pub async fn rebuild_snapshot(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Option<Version>, DomainError> {
        let aggregate = self.replay_from_scratch(aggregate_id).await?;
        if aggregate.is_new() {
            return Ok(None);
        }
        self.save_snapshot(&aggregate).await?;
        Ok(Some(aggregate.version()))
    }

    /// Stores a snapshot of the aggregate at its current version.
    pub async fn save_snapshot(&self, aggregate: &A) -> Result<(), DomainError> {
        let snapshot = Snapshot::from_state(
            aggregate.id(),
            A::aggregate_type(),
            aggregate.version(),
            aggregate,
        )?;
        self.store.save_snapshot(snapshot).await?;
        metrics::counter!("repository_snapshots_saved_total").increment(1);
        Ok(())
    }

    /// Appends the aggregate's pending events.
    ///
    /// The expected version is the aggregate's version before the pending
    /// events were applied. On success the pending buffer is cleared and the
    /// stored events are published; on conflict the aggregate is left as it
    /// was and must be reloaded.
    #[tracing::instrument(
        skip(self, aggregate),
        fields(aggregate_id = %aggregate.id(), version = %aggregate.version())
    )]
    pub async fn save(&self, aggregate: &mut A) -> Result<Vec<StoredEvent>, DomainError> {
        let aggregate_id = aggregate.id();
        let pending = aggregate.core().pending_events();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let expected_version = aggregate.version().rewind_by(pending.len());
        let events = pending
            .iter()
            .map(|p| p.to_new_event())
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self
            .store
            .save_events(aggregate_id, events, expected_version)
            .await?;
        aggregate.core_mut().clear_pending_events();

        if self.crossed_snapshot_boundary(expected_version, aggregate.version()) {
            if let Err(e) = self.save_snapshot(aggregate).await {
                tracing::warn!(%aggregate_id, error = %e, "Failed to save snapshot");
            }
        }

        self.publish(aggregate_id, &stored).await;

        Ok(stored)
    }

    /// Loads an existing aggregate, runs `mutation` on it and saves the result.
    ///
    /// On a concurrency conflict the aggregate is reloaded and the mutation
    /// re-run, up to `max_attempts` attempts in total.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        mutation: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&mut A) -> Result<(), A::Error> + Send + Sync,
        DomainError: From<A::Error>,
    {
        self.run(aggregate_id, true, mutation).await
    }

    /// Like [`Repository::execute`], but starts from the zero state when the
    /// aggregate has no history. Used by creation commands.
    pub async fn create<F>(
        &self,
        aggregate_id: AggregateId,
        mutation: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&mut A) -> Result<(), A::Error> + Send + Sync,
        DomainError: From<A::Error>,
    {
        self.run(aggregate_id, false, mutation).await
    }

    #[tracing::instrument(skip(self, mutation), fields(aggregate_type = A::aggregate_type()))]
    async fn run<F>(
        &self,
        aggregate_id: AggregateId,
        require_existing: bool,
        mutation: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&mut A) -> Result<(), A::Error> + Send + Sync,
        DomainError: From<A::Error>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut aggregate = if require_existing {
                self.load(aggregate_id).await?
            } else {
                self.rehydrate(aggregate_id).await?
            };

            mutation(&mut aggregate)?;

            match self.save(&mut aggregate).await {
                Ok(events) => {
                    let new_version = aggregate.version();
                    return Ok(CommandResult {
                        aggregate,
                        events,
                        new_version,
                        attempts,
                    });
                }
                Err(e) if e.is_retryable() && attempts < max_attempts => {
                    tracing::warn!(%aggregate_id, attempts, error = %e, "Retrying after conflict");
                    metrics::counter!("repository_command_retries_total").increment(1);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn crossed_snapshot_boundary(&self, from: Version, to: Version) -> bool {
        let interval = self.config.snapshot_interval as i64;
        interval > 0 && from.as_i64() / interval != to.as_i64() / interval
    }

    async fn publish(&self, aggregate_id: AggregateId, events: &[StoredEvent]) {
        for subscriber in &self.subscribers {
            subscriber.on_committed(aggregate_id, events).await;
        }
    }

    fn restore_snapshot(aggregate_id: AggregateId, snapshot: Snapshot) -> Result<A, DomainError> {
        if snapshot.aggregate_type != A::aggregate_type() {
            return Err(DomainError::CorruptSnapshot {
                aggregate_id,
                reason: format!(
                    "snapshot is of type {}, expected {}",
                    snapshot.aggregate_type,
                    A::aggregate_type()
                ),
            });
        }

        let snapshot_version = snapshot.version;
        let aggregate: A = snapshot.into_state().map_err(|e| {
            tracing::error!(%aggregate_id, error = %e, "Failed to deserialize snapshot");
            DomainError::CorruptSnapshot {
                aggregate_id,
                reason: e.to_string(),
            }
        })?;

        if aggregate.id() != aggregate_id || aggregate.version() != snapshot_version {
            return Err(DomainError::CorruptSnapshot {
                aggregate_id,
                reason: format!(
                    "state is {} at version {}, snapshot row says version {}",
                    aggregate.id(),
                    aggregate.version(),
                    snapshot_version
                ),
            });
        }

        Ok(aggregate)
    }

    fn replay_onto(aggregate: &mut A, events: Vec<StoredEvent>) -> Result<(), DomainError> {
        let registry = A::Event::registry();

        for stored in events {
            let expected = aggregate.version().next();
            if stored.version != expected {
                return Err(DomainError::StreamGap {
                    aggregate_id: aggregate.id(),
                    expected,
                    found: stored.version,
                });
            }

            let event = registry
                .decode(&stored.event_type, stored.payload)
                .map_err(|source| {
                    tracing::error!(
                        aggregate_id = %stored.aggregate_id,
                        version = %stored.version,
                        event_type = %stored.event_type,
                        error = %source,
                        "Failed to decode stored event"
                    );
                    DomainError::Decode {
                        aggregate_id: stored.aggregate_id,
                        version: stored.version,
                        event_type: stored.event_type.clone(),
                        source,
                    }
                })?;

            aggregate.replay(&event, stored.version, stored.timestamp);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use event_store::{
        EventStoreError, EventStream, InMemoryEventStore, NewEvent, Result as StoreResult,
    };
    use serde::{Deserialize, Serialize};
    use tokio::sync::Mutex;

    use crate::aggregate::AggregateCore;
    use crate::event::EventRegistry;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Opened {
        label: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Fed {
        grams: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum FeederEvent {
        Opened(Opened),
        Fed(Fed),
    }

    static REGISTRY: LazyLock<EventRegistry<FeederEvent>> = LazyLock::new(|| {
        EventRegistry::new()
            .register("FeederOpened", FeederEvent::Opened)
            .register("FeederFed", FeederEvent::Fed)
    });

    impl DomainEvent for FeederEvent {
        fn event_type(&self) -> &'static str {
            match self {
                FeederEvent::Opened(_) => "FeederOpened",
                FeederEvent::Fed(_) => "FeederFed",
            }
        }

        fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
            match self {
                FeederEvent::Opened(data) => serde_json::to_value(data),
                FeederEvent::Fed(data) => serde_json::to_value(data),
            }
        }

        fn registry() -> &'static EventRegistry<Self> {
            &REGISTRY
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Feeder {
        core: AggregateCore<FeederEvent>,
        label: String,
        total_grams: u32,
    }

    #[derive(Debug, thiserror::Error)]
    enum FeederError {
        #[error("already opened")]
        AlreadyOpened,
        #[error("portion must be positive")]
        EmptyPortion,
    }

    impl From<FeederError> for DomainError {
        fn from(e: FeederError) -> Self {
            DomainError::Validation(e.to_string())
        }
    }

    impl Aggregate for Feeder {
        type Event = FeederEvent;
        type Error = FeederError;

        fn aggregate_type() -> &'static str {
            "Feeder"
        }

        fn new(id: AggregateId) -> Self {
            Self {
                core: AggregateCore::new(id),
                label: String::new(),
                total_grams: 0,
            }
        }

        fn core(&self) -> &AggregateCore<FeederEvent> {
            &self.core
        }

        fn core_mut(&mut self) -> &mut AggregateCore<FeederEvent> {
            &mut self.core
        }

        fn when(&mut self, event: &FeederEvent) {
            match event {
                FeederEvent::Opened(data) => self.label = data.label.clone(),
                FeederEvent::Fed(data) => self.total_grams += data.grams,
            }
        }
    }

    impl Feeder {
        fn open(&mut self, label: &str) -> Result<(), FeederError> {
            if !self.is_new() {
                return Err(FeederError::AlreadyOpened);
            }
            self.apply(FeederEvent::Opened(Opened {
                label: label.to_string(),
            }));
            Ok(())
        }

        fn feed(&mut self, grams: u32) -> Result<(), FeederError> {
            if grams == 0 {
                return Err(FeederError::EmptyPortion);
            }
            self.apply(FeederEvent::Fed(Fed { grams }));
            Ok(())
        }
    }

    /// Store that reports a conflict for the first `failures` appends.
    struct ContendedStore {
        inner: InMemoryEventStore,
        failures: AtomicU32,
    }

    impl ContendedStore {
        fn new(inner: InMemoryEventStore, failures: u32) -> Self {
            Self {
                inner,
                failures: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl EventStore for ContendedStore {
        async fn save_events(
            &self,
            aggregate_id: AggregateId,
            events: Vec<NewEvent>,
            expected_version: Version,
        ) -> StoreResult<Vec<StoredEvent>> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: expected_version,
                    actual: expected_version.next(),
                });
            }
            self.inner
                .save_events(aggregate_id, events, expected_version)
                .await
        }

        async fn get_events(
            &self,
            aggregate_id: AggregateId,
            from_version: Version,
        ) -> StoreResult<Vec<StoredEvent>> {
            self.inner.get_events(aggregate_id, from_version).await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> StoreResult<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }

        async fn stream_all_events(&self) -> StoreResult<EventStream> {
            self.inner.stream_all_events().await
        }

        async fn save_snapshot(&self, snapshot: Snapshot) -> StoreResult<()> {
            self.inner.save_snapshot(snapshot).await
        }

        async fn get_snapshot(&self, aggregate_id: AggregateId) -> StoreResult<Option<Snapshot>> {
            self.inner.get_snapshot(aggregate_id).await
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(AggregateId, Version)>>,
    }

    #[async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn on_committed(&self, aggregate_id: AggregateId, events: &[StoredEvent]) {
            let mut seen = self.seen.lock().await;
            seen.extend(events.iter().map(|e| (aggregate_id, e.version)));
        }
    }

    async fn opened_feeder(repository: &Repository<InMemoryEventStore, Feeder>) -> AggregateId {
        let id = AggregateId::new();
        repository
            .create(id, |feeder| feeder.open("north pond"))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn load_unknown_aggregate_is_not_found() {
        let repository: Repository<_, Feeder> = Repository::new(InMemoryEventStore::new());

        let result = repository.load(AggregateId::new()).await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound { .. })));
        assert!(repository
            .load_existing(AggregateId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn create_then_load() {
        let repository: Repository<_, Feeder> = Repository::new(InMemoryEventStore::new());
        let id = opened_feeder(&repository).await;

        let feeder = repository.load(id).await.unwrap();

        assert_eq!(feeder.label, "north pond");
        assert_eq!(feeder.version(), Version::first());
        assert!(feeder.core().pending_events().is_empty());
    }

    #[tokio::test]
    async fn execute_appends_after_current_version() {
        let repository: Repository<_, Feeder> = Repository::new(InMemoryEventStore::new());
        let id = opened_feeder(&repository).await;

        let result = repository
            .execute(id, |feeder| {
                feeder.feed(10)?;
                feeder.feed(15)
            })
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(3));
        assert_eq!(result.aggregate.total_grams, 25);
        assert_eq!(result.attempts, 1);
        let versions: Vec<i64> = result.events.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![2, 3]);
    }

    #[tokio::test]
    async fn execute_on_missing_aggregate_is_not_found() {
        let repository: Repository<_, Feeder> = Repository::new(InMemoryEventStore::new());

        let result = repository
            .execute(AggregateId::new(), |feeder| feeder.feed(1))
            .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound { .. })));
    }

    #[tokio::test]
    async fn rejected_mutation_persists_nothing() {
        let store = InMemoryEventStore::new();
        let repository: Repository<_, Feeder> = Repository::new(store.clone());
        let id = opened_feeder(&repository).await;

        let result = repository.execute(id, |feeder| feeder.feed(0)).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn mutation_without_events_is_a_no_op() {
        let store = InMemoryEventStore::new();
        let repository: Repository<_, Feeder> = Repository::new(store.clone());
        let id = opened_feeder(&repository).await;

        let result = repository.execute(id, |_| Ok(())).await.unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::first());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn stale_save_is_a_conflict_and_keeps_pending() {
        let repository: Repository<_, Feeder> = Repository::new(InMemoryEventStore::new());
        let id = opened_feeder(&repository).await;

        let mut first = repository.load(id).await.unwrap();
        let mut second = repository.load(id).await.unwrap();
        first.feed(1).unwrap();
        second.feed(2).unwrap();

        repository.save(&mut first).await.unwrap();
        let result = repository.save(&mut second).await;

        assert!(matches!(result, Err(DomainError::Concurrency { .. })));
        assert_eq!(second.core().pending_events().len(), 1);
    }

    #[tokio::test]
    async fn execute_retries_after_conflict() {
        let inner = InMemoryEventStore::new();
        let seeded: Repository<_, Feeder> = Repository::new(inner.clone());
        let id = opened_feeder(&seeded).await;

        let repository: Repository<_, Feeder> = Repository::new(ContendedStore::new(inner, 1));
        let calls = AtomicU32::new(0);

        let result = repository
            .execute(id, |feeder| {
                calls.fetch_add(1, Ordering::SeqCst);
                feeder.feed(5)
            })
            .await
            .unwrap();

        assert_eq!(result.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.new_version, Version::new(2));
    }

    #[tokio::test]
    async fn execute_surfaces_conflict_after_max_attempts() {
        let inner = InMemoryEventStore::new();
        let seeded: Repository<_, Feeder> = Repository::new(inner.clone());
        let id = opened_feeder(&seeded).await;

        let config = RepositoryConfig {
            snapshot_interval: 0,
            max_attempts: 2,
        };
        let repository: Repository<_, Feeder> =
            Repository::with_config(ContendedStore::new(inner.clone(), 5), config);

        let result = repository.execute(id, |feeder| feeder.feed(5)).await;

        assert!(matches!(result, Err(ref e) if e.is_retryable()));
        assert_eq!(inner.event_count().await, 1);
    }

    #[tokio::test]
    async fn snapshots_follow_the_interval() {
        let store = InMemoryEventStore::new();
        let config = RepositoryConfig {
            snapshot_interval: 2,
            max_attempts: 1,
        };
        let repository: Repository<_, Feeder> = Repository::with_config(store.clone(), config);
        let id = opened_feeder(&repository).await;
        assert!(store.get_snapshot(id).await.unwrap().is_none());

        repository.execute(id, |f| f.feed(1)).await.unwrap();
        let snapshot = store.get_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(2));

        repository.execute(id, |f| f.feed(1)).await.unwrap();
        let snapshot = store.get_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(2));

        // A batch jumping over a boundary still snapshots.
        repository
            .execute(id, |f| {
                f.feed(1)?;
                f.feed(1)
            })
            .await
            .unwrap();
        let snapshot = store.get_snapshot(id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(5));
    }

    #[tokio::test]
    async fn snapshot_plus_tail_equals_full_replay() {
        let store = InMemoryEventStore::new();
        let repository: Repository<_, Feeder> = Repository::new(store.clone());
        let id = opened_feeder(&repository).await;
        repository.execute(id, |f| f.feed(3)).await.unwrap();

        assert_eq!(repository.rebuild_snapshot(id).await.unwrap(), Some(Version::new(2)));

        repository.execute(id, |f| f.feed(4)).await.unwrap();
        repository.execute(id, |f| f.feed(5)).await.unwrap();

        let from_snapshot = repository.load(id).await.unwrap();
        let from_scratch = repository.replay_from_scratch(id).await.unwrap();

        assert_eq!(from_snapshot, from_scratch);
        assert_eq!(from_snapshot.total_grams, 12);
        assert_eq!(from_snapshot.version(), Version::new(4));
    }

    #[tokio::test]
    async fn unknown_event_type_fails_replay() {
        let store = InMemoryEventStore::new();
        let repository: Repository<_, Feeder> = Repository::new(store.clone());
        let id = opened_feeder(&repository).await;

        store
            .save_events(
                id,
                vec![NewEvent::new("FeederExploded", serde_json::json!({}))],
                Version::first(),
            )
            .await
            .unwrap();

        let result = repository.load(id).await;

        match result {
            Err(DomainError::Decode {
                version,
                event_type,
                ..
            }) => {
                assert_eq!(version, Version::new(2));
                assert_eq!(event_type, "FeederExploded");
            }
            other => panic!("expected decode failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_fails_replay() {
        let store = InMemoryEventStore::new();
        let repository: Repository<_, Feeder> = Repository::new(store.clone());
        let id = opened_feeder(&repository).await;

        store
            .save_events(
                id,
                vec![NewEvent::new("FeederFed", serde_json::json!({"grams": "many"}))],
                Version::first(),
            )
            .await
            .unwrap();

        let result = repository.load(id).await;
        assert!(matches!(result, Err(DomainError::Decode { .. })));
    }

    #[tokio::test]
    async fn snapshot_of_another_type_is_rejected() {
        let store = InMemoryEventStore::new();
        let repository: Repository<_, Feeder> = Repository::new(store.clone());
        let id = opened_feeder(&repository).await;

        store
            .save_snapshot(Snapshot::new(id, "Pump", Version::first(), serde_json::json!({})))
            .await
            .unwrap();

        let result = repository.load(id).await;
        assert!(matches!(result, Err(DomainError::CorruptSnapshot { .. })));
    }

    #[tokio::test]
    async fn subscribers_receive_committed_events() {
        let recorder = Arc::new(Recorder::default());
        let mut repository: Repository<_, Feeder> = Repository::new(InMemoryEventStore::new());
        repository.subscribe(recorder.clone());

        let id = opened_feeder(&repository).await;
        repository
            .execute(id, |f| {
                f.feed(1)?;
                f.feed(2)
            })
            .await
            .unwrap();

        let seen = recorder.seen.lock().await.clone();
        assert_eq!(
            seen,
            vec![(id, Version::new(1)), (id, Version::new(2)), (id, Version::new(3))]
        );
    }
}
