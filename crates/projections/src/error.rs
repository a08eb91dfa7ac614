//! Projection error types.

use common::AggregateId;
use domain::DecodeError;
use event_store::Version;
use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A read-model database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored event of a known type could not be decoded.
    #[error("Failed to decode {event_type} at version {version} of aggregate {aggregate_id}: {source}")]
    Decode {
        aggregate_id: AggregateId,
        version: Version,
        event_type: String,
        #[source]
        source: DecodeError,
    },

    /// Missing events could not be fetched to fill a version gap.
    #[error(
        "Projection {projection} has a gap for aggregate {aggregate_id}: applied up to {last_applied}, got {found}"
    )]
    UnrepairedGap {
        projection: &'static str,
        aggregate_id: AggregateId,
        last_applied: Version,
        found: Version,
    },

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
