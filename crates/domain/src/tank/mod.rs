//! Tank aggregate and related types.

mod aggregate;
mod commands;
pub mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Tank;
pub use commands::*;
pub use events::{
    SensorAddedData, SensorRemovedData, StatusChangedData, TankCreatedData, TankEvent,
    TankRenamedData,
};
pub use service::TankService;
pub use state::TankStatus;
pub use value_objects::{MAX_NAME_LENGTH, Sensor, SensorId, SensorType, TankId, TankName};

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during tank operations.
#[derive(Debug, Error)]
pub enum TankError {
    /// Tank name failed validation.
    #[error("Invalid tank name: {reason}")]
    InvalidName { reason: &'static str },

    /// Location is required.
    #[error("Tank location is required")]
    InvalidLocation,

    /// Capacity must be a positive number of liters.
    #[error("Invalid capacity: {capacity_liters} (must be greater than 0)")]
    InvalidCapacity { capacity_liters: f64 },

    /// Tank is already created.
    #[error("Tank already created")]
    AlreadyCreated,

    /// Tank has not been created yet.
    #[error("Tank has not been created")]
    NotCreated,

    /// The tank's status does not allow the action.
    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: TankStatus,
        action: &'static str,
    },

    /// Activation requires at least one sensor.
    #[error("Tank has no sensors")]
    NoSensors,

    /// Sensor is already attached.
    #[error("Sensor already attached: {sensor_id}")]
    DuplicateSensor { sensor_id: SensorId },

    /// Sensor is not attached to the tank.
    #[error("Sensor not found: {sensor_id}")]
    SensorNotFound { sensor_id: SensorId },

    /// An active tank must keep at least one sensor.
    #[error("Cannot remove sensor {sensor_id}: it is the last sensor of an active tank")]
    LastSensorOnActiveTank { sensor_id: SensorId },
}

impl TankError {
    /// Classifies the error: malformed input is a validation failure, a
    /// request that clashes with the tank's current state is a conflict.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TankError::InvalidName { .. }
            | TankError::InvalidLocation
            | TankError::InvalidCapacity { .. } => ErrorKind::Validation,
            TankError::NotCreated | TankError::SensorNotFound { .. } => ErrorKind::NotFound,
            TankError::AlreadyCreated
            | TankError::InvalidStateTransition { .. }
            | TankError::NoSensors
            | TankError::DuplicateSensor { .. }
            | TankError::LastSensorOnActiveTank { .. } => ErrorKind::Conflict,
        }
    }
}
