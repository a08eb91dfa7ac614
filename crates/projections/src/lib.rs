//! Read models and projections for the CQRS query side.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`Projection`] trait for idempotent, version-checked event handling
//! - [`ReadModel`] and [`TankReadModel`] traits for query access
//! - [`ProjectionProcessor`] for live delivery, gap repair, retries and
//!   catch-up from the store
//! - [`EventNotifier`] for broadcasting committed events in-process
//! - Tank and sensor views, in memory and (for tanks) in PostgreSQL

pub mod error;
pub mod notifier;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use notifier::{EventNotifier, Notification};
pub use processor::{PendingProjection, ProjectionProcessor};
pub use projection::{ApplyOutcome, Projection, ProjectionPosition, VersionCheck, check_version};
pub use read_model::{ReadModel, TankReadModel};
pub use views::{PostgresTankView, SensorRow, SensorView, TankQuery, TankRow, TankView};
