//! Shared types for the AquaControl event-sourcing core.

pub mod types;

pub use types::AggregateId;
