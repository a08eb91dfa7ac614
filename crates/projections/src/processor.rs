//! Projection processor for feeding events to projections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventStore, EventSubscriber, StoredEvent};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::projection::{ApplyOutcome, Projection};
use crate::{ProjectionError, Result};

/// An event a projection failed to apply, waiting to be retried.
#[derive(Debug, Clone)]
pub struct PendingProjection {
    pub projection: &'static str,
    pub aggregate_id: AggregateId,
    pub event: StoredEvent,
    pub attempts: u32,
    pub last_error: String,
    pub first_failed_at: DateTime<Utc>,
}

impl PendingProjection {
    fn is_same_delivery(&self, other: &PendingProjection) -> bool {
        self.projection == other.projection && self.event.id == other.event.id
    }
}

/// Processes events from an event store and delivers them to projections.
///
/// The processor supports:
/// - Live delivery: registered as an [`EventSubscriber`], it receives every
///   committed batch
/// - Gap repair: when a projection reports missing versions, they are read
///   back from the store and applied first
/// - Retry: failed deliveries are queued and retried by [`retry_pending`]
/// - Catch-up and rebuild from the full log
///
/// [`retry_pending`]: ProjectionProcessor::retry_pending
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    pending: Mutex<Vec<PendingProjection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Returns a copy of the retry queue.
    pub async fn pending(&self) -> Vec<PendingProjection> {
        self.pending.lock().await.clone()
    }

    /// Delivers one event to one projection, repairing a version gap from
    /// the store if the projection reports one.
    async fn deliver(&self, projection: &dyn Projection, event: &StoredEvent) -> Result<ApplyOutcome> {
        let last_applied = match projection.handle(event).await? {
            ApplyOutcome::Gap { last_applied } => last_applied,
            outcome => {
                if outcome == ApplyOutcome::Applied {
                    metrics::counter!("projections_events_processed").increment(1);
                }
                return Ok(outcome);
            }
        };

        tracing::debug!(
            projection = projection.name(),
            aggregate_id = %event.aggregate_id,
            last_applied = %last_applied,
            version = %event.version,
            "repairing projection gap"
        );

        let missing = self
            .store
            .get_events(event.aggregate_id, last_applied)
            .await?;

        for earlier in missing.iter().filter(|e| e.version <= event.version) {
            match projection.handle(earlier).await? {
                ApplyOutcome::Applied => {
                    metrics::counter!("projections_events_processed").increment(1);
                }
                ApplyOutcome::Skipped => {}
                ApplyOutcome::Gap { last_applied } => {
                    return Err(ProjectionError::UnrepairedGap {
                        projection: projection.name(),
                        aggregate_id: event.aggregate_id,
                        last_applied,
                        found: earlier.version,
                    });
                }
            }
        }

        Ok(ApplyOutcome::Applied)
    }

    async fn enqueue(&self, projection: &'static str, event: &StoredEvent, error: &ProjectionError) {
        tracing::warn!(
            projection,
            aggregate_id = %event.aggregate_id,
            version = %event.version,
            event_type = %event.event_type,
            error = %error,
            "projection failed, queued for retry"
        );
        metrics::counter!("projections_failures_total", "projection" => projection).increment(1);

        let mut pending = self.pending.lock().await;
        pending.push(PendingProjection {
            projection,
            aggregate_id: event.aggregate_id,
            event: event.clone(),
            attempts: 1,
            last_error: error.to_string(),
            first_failed_at: Utc::now(),
        });
        metrics::gauge!("projections_pending_retries").set(pending.len() as f64);
    }

    /// Delivers a single event to all registered projections.
    ///
    /// Every projection is attempted. Failures are queued for retry and the
    /// last one is returned.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, version = %event.version))]
    pub async fn process_event(&self, event: &StoredEvent) -> Result<()> {
        let mut failure = None;
        for projection in &self.projections {
            if let Err(e) = self.deliver(projection.as_ref(), event).await {
                self.enqueue(projection.name(), event, &e).await;
                failure = Some(e);
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// Retries every queued delivery once, in the order they failed.
    ///
    /// Returns the number of deliveries that succeeded. An entry stays on
    /// the queue until its retry settles, so [`pending`] keeps reporting it
    /// during a pass and a pass dropped midway loses nothing. Entries that
    /// fail again keep their place.
    ///
    /// [`pending`]: ProjectionProcessor::pending
    #[tracing::instrument(skip(self))]
    pub async fn retry_pending(&self) -> usize {
        let queued = self.pending().await;
        if queued.is_empty() {
            return 0;
        }

        let mut resolved = 0;
        for entry in queued {
            let projection = self
                .projections
                .iter()
                .find(|p| p.name() == entry.projection);
            let outcome = match projection {
                Some(projection) => Some(self.deliver(projection.as_ref(), &entry.event).await),
                None => None,
            };

            let mut pending = self.pending.lock().await;
            // Gone if the queue was cleared by a rebuild meanwhile.
            let Some(index) = pending.iter().position(|p| p.is_same_delivery(&entry)) else {
                continue;
            };
            match outcome {
                Some(Ok(_)) => {
                    pending.remove(index);
                    resolved += 1;
                }
                Some(Err(e)) => {
                    let failed = &mut pending[index];
                    failed.attempts += 1;
                    failed.last_error = e.to_string();
                    tracing::warn!(
                        projection = failed.projection,
                        aggregate_id = %failed.aggregate_id,
                        version = %failed.event.version,
                        attempts = failed.attempts,
                        error = %e,
                        "projection retry failed"
                    );
                }
                None => {
                    tracing::warn!(
                        projection = entry.projection,
                        "dropping retry for unregistered projection"
                    );
                    pending.remove(index);
                }
            }
            metrics::gauge!("projections_pending_retries").set(pending.len() as f64);
        }

        if resolved > 0 {
            let remaining = self.pending.lock().await.len();
            tracing::info!(resolved, remaining, "projection retries resolved");
        }
        resolved
    }

    /// Runs catch-up processing: streams all events from the store and
    /// delivers them to every projection.
    ///
    /// Events a projection has already applied are skipped by the
    /// projection itself. A failing projection does not stop catch-up; its
    /// failures are queued. Returns the number of events streamed.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut stream = self.store.stream_all_events().await?;
        let mut events_seen: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            events_seen += 1;
            // Already queued and logged.
            let _ = self.process_event(&event).await;
        }

        tracing::info!(events_seen, "catch-up complete");

        Ok(events_seen)
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.pending.lock().await.clear();
        metrics::gauge!("projections_pending_retries").set(0.0);
        self.run_catch_up().await
    }
}

#[async_trait]
impl<S: EventStore> EventSubscriber for ProjectionProcessor<S> {
    fn name(&self) -> &'static str {
        "projections"
    }

    async fn on_committed(&self, _aggregate_id: AggregateId, events: &[StoredEvent]) {
        for event in events {
            // Already queued and logged.
            let _ = self.process_event(event).await;
        }
    }
}
