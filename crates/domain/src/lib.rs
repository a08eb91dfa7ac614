//! Domain layer for the AquaControl core.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait and the pending-event bookkeeping every aggregate carries
//! - DomainEvent trait and the discriminator registry used to decode events
//! - Repository for snapshot-plus-replay loading and optimistic saving
//! - Tank aggregate implementation with its status state machine

pub mod aggregate;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
pub mod tank;

pub use aggregate::{Aggregate, AggregateCore};
pub use command::{Command, CommandResult};
pub use error::{DomainError, ErrorKind};
pub use event::{DecodeError, DomainEvent, EventRegistry, PendingEvent};
pub use repository::{Repository, RepositoryConfig};
pub use tank::{
    ActivateTank, AddSensor, CreateTank, DeactivateTank, DeclareEmergency, RemoveSensor,
    RenameTank, Sensor, SensorId, SensorType, StartCleaning, StartMaintenance, Tank,
    TankCommand, TankError, TankEvent, TankId, TankName, TankService, TankStatus,
};
