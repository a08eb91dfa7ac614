//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use thiserror::Error;

use crate::event::DecodeError;
use crate::tank::TankError;

/// Caller-facing classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The aggregate does not exist.
    NotFound,
    /// Optimistic-concurrency violation or a uniqueness/state conflict.
    Conflict,
    /// The command failed a precondition.
    Validation,
    /// Infrastructure or serialization failure.
    Failure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Failure => "failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// Another writer committed to the stream first.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    Concurrency {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The command was rejected before reaching an aggregate.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An error occurred in the tank aggregate.
    #[error("Tank error: {0}")]
    Tank(TankError),

    /// A stored event could not be decoded during replay.
    #[error("Failed to decode {event_type} at version {version} of aggregate {aggregate_id}: {source}")]
    Decode {
        aggregate_id: AggregateId,
        version: Version,
        event_type: String,
        #[source]
        source: DecodeError,
    },

    /// The stored stream skips or repeats a version.
    #[error("Event stream of aggregate {aggregate_id} is not contiguous: expected version {expected}, found {found}")]
    StreamGap {
        aggregate_id: AggregateId,
        expected: Version,
        found: Version,
    },

    /// A snapshot could not be restored.
    #[error("Corrupt snapshot for aggregate {aggregate_id}: {reason}")]
    CorruptSnapshot {
        aggregate_id: AggregateId,
        reason: String,
    },

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Classifies the error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::AggregateNotFound { .. } => ErrorKind::NotFound,
            DomainError::Concurrency { .. } => ErrorKind::Conflict,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::Tank(e) => e.kind(),
            DomainError::Decode { .. }
            | DomainError::StreamGap { .. }
            | DomainError::CorruptSnapshot { .. }
            | DomainError::EventStore(_)
            | DomainError::Serialization(_) => ErrorKind::Failure,
        }
    }

    /// Returns true if reloading the aggregate and retrying may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Concurrency { .. })
    }
}

impl From<EventStoreError> for DomainError {
    fn from(e: EventStoreError) -> Self {
        match e {
            EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => DomainError::Concurrency {
                aggregate_id,
                expected,
                actual,
            },
            other => DomainError::EventStore(other),
        }
    }
}
