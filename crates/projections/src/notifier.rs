//! Broadcast of committed events to in-process listeners.

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventSubscriber, StoredEvent};
use tokio::sync::broadcast;

/// A committed event, as seen by listeners.
#[derive(Debug, Clone)]
pub struct Notification {
    pub aggregate_id: AggregateId,
    pub event: StoredEvent,
}

/// Fans committed events out to any number of receivers.
///
/// Receivers that fall behind by more than the channel capacity miss
/// notifications and see a lag error; they should reload from the read
/// model rather than rely on the notification stream for state.
#[derive(Clone)]
pub struct EventNotifier {
    sender: broadcast::Sender<Notification>,
}

impl EventNotifier {
    /// Creates a notifier buffering up to `capacity` notifications per
    /// receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a receiver for notifications sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Returns the number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventSubscriber for EventNotifier {
    fn name(&self) -> &'static str {
        "notifier"
    }

    async fn on_committed(&self, aggregate_id: AggregateId, events: &[StoredEvent]) {
        for event in events {
            // No receivers is not an error.
            let _ = self.sender.send(Notification {
                aggregate_id,
                event: event.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{NewEvent, Version};

    fn event(aggregate_id: AggregateId, version: i64) -> StoredEvent {
        StoredEvent::from_new(
            aggregate_id,
            Version::new(version),
            NewEvent::new("TankRenamed", serde_json::json!({})),
        )
    }

    #[tokio::test]
    async fn receivers_get_events_in_order() {
        let notifier = EventNotifier::new(16);
        let mut receiver = notifier.subscribe();
        let aggregate_id = AggregateId::new();

        notifier
            .on_committed(aggregate_id, &[event(aggregate_id, 1), event(aggregate_id, 2)])
            .await;

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.aggregate_id, aggregate_id);
        assert_eq!(first.event.version, Version::new(1));
        assert_eq!(second.event.version, Version::new(2));
    }

    #[tokio::test]
    async fn sending_without_receivers_is_fine() {
        let notifier = EventNotifier::new(4);
        assert_eq!(notifier.receiver_count(), 0);

        let aggregate_id = AggregateId::new();
        notifier
            .on_committed(aggregate_id, &[event(aggregate_id, 1)])
            .await;
    }
}
