use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stored version did not match the expected version at commit time.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The batch handed to `save_events` was malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A snapshot claimed a version the event log has not reached.
    #[error(
        "Invalid snapshot for aggregate {aggregate_id}: snapshot version {snapshot_version} exceeds stored version {stored_version}"
    )]
    InvalidSnapshot {
        aggregate_id: AggregateId,
        snapshot_version: Version,
        stored_version: Version,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns true for optimistic-concurrency conflicts, which callers may
    /// resolve by reloading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
