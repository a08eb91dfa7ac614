//! Append-only event log with optimistic concurrency and snapshot storage.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;
pub mod subscriber;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventId, NewEvent, StoredEvent, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{EventStore, EventStoreExt, EventStream};
pub use subscriber::EventSubscriber;
