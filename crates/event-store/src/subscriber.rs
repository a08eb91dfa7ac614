//! Committed-event hook.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{AggregateId, StoredEvent};

/// Receives events after they have been durably appended.
///
/// Delivery is at-least-once and in version order per aggregate; there is
/// no ordering across aggregates. A subscriber cannot fail the command that
/// produced the events: by the time it is called the events are committed,
/// so any failure must be tracked by the subscriber itself.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Returns the name of this subscriber, used in logs.
    fn name(&self) -> &'static str;

    /// Handles a batch of events committed to one aggregate's stream.
    async fn on_committed(&self, aggregate_id: AggregateId, events: &[StoredEvent]);
}

#[async_trait]
impl<T: EventSubscriber + ?Sized> EventSubscriber for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn on_committed(&self, aggregate_id: AggregateId, events: &[StoredEvent]) {
        (**self).on_committed(aggregate_id, events).await
    }
}
