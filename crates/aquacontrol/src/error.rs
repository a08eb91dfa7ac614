//! Application-level error type.

use domain::DomainError;
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced while starting or running the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Logging or metrics could not be installed.
    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),
}
