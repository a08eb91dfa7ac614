//! Tank domain events.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::event::{DomainEvent, EventRegistry};

use super::{Sensor, SensorId, SensorType, TankId, TankName, TankStatus};

/// Events that can occur on a tank aggregate.
///
/// Each variant is stored under the discriminator returned by
/// [`DomainEvent::event_type`]; the payload is the variant's data struct.
#[derive(Debug, Clone, PartialEq)]
pub enum TankEvent {
    /// Tank was created.
    Created(TankCreatedData),

    /// Tank was renamed.
    Renamed(TankRenamedData),

    /// A sensor was attached.
    SensorAdded(SensorAddedData),

    /// A sensor was detached.
    SensorRemoved(SensorRemovedData),

    /// Tank went into operation.
    Activated(StatusChangedData),

    /// Tank was taken out of operation.
    Deactivated(StatusChangedData),

    /// Maintenance started.
    MaintenanceStarted(StatusChangedData),

    /// Cleaning started.
    CleaningStarted(StatusChangedData),

    /// An emergency was declared.
    EmergencyDeclared(StatusChangedData),
}

pub const TANK_CREATED: &str = "TankCreated";
pub const TANK_RENAMED: &str = "TankRenamed";
pub const SENSOR_ADDED: &str = "SensorAdded";
pub const SENSOR_REMOVED: &str = "SensorRemoved";
pub const TANK_ACTIVATED: &str = "TankActivated";
pub const TANK_DEACTIVATED: &str = "TankDeactivated";
pub const MAINTENANCE_STARTED: &str = "TankMaintenanceStarted";
pub const CLEANING_STARTED: &str = "TankCleaningStarted";
pub const EMERGENCY_DECLARED: &str = "TankEmergencyDeclared";

static REGISTRY: LazyLock<EventRegistry<TankEvent>> = LazyLock::new(|| {
    EventRegistry::new()
        .register(TANK_CREATED, TankEvent::Created)
        .register(TANK_RENAMED, TankEvent::Renamed)
        .register(SENSOR_ADDED, TankEvent::SensorAdded)
        .register(SENSOR_REMOVED, TankEvent::SensorRemoved)
        .register(TANK_ACTIVATED, TankEvent::Activated)
        .register(TANK_DEACTIVATED, TankEvent::Deactivated)
        .register(MAINTENANCE_STARTED, TankEvent::MaintenanceStarted)
        .register(CLEANING_STARTED, TankEvent::CleaningStarted)
        .register(EMERGENCY_DECLARED, TankEvent::EmergencyDeclared)
});

impl DomainEvent for TankEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TankEvent::Created(_) => TANK_CREATED,
            TankEvent::Renamed(_) => TANK_RENAMED,
            TankEvent::SensorAdded(_) => SENSOR_ADDED,
            TankEvent::SensorRemoved(_) => SENSOR_REMOVED,
            TankEvent::Activated(_) => TANK_ACTIVATED,
            TankEvent::Deactivated(_) => TANK_DEACTIVATED,
            TankEvent::MaintenanceStarted(_) => MAINTENANCE_STARTED,
            TankEvent::CleaningStarted(_) => CLEANING_STARTED,
            TankEvent::EmergencyDeclared(_) => EMERGENCY_DECLARED,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            TankEvent::Created(data) => serde_json::to_value(data),
            TankEvent::Renamed(data) => serde_json::to_value(data),
            TankEvent::SensorAdded(data) => serde_json::to_value(data),
            TankEvent::SensorRemoved(data) => serde_json::to_value(data),
            TankEvent::Activated(data)
            | TankEvent::Deactivated(data)
            | TankEvent::MaintenanceStarted(data)
            | TankEvent::CleaningStarted(data)
            | TankEvent::EmergencyDeclared(data) => serde_json::to_value(data),
        }
    }

    fn registry() -> &'static EventRegistry<Self> {
        &REGISTRY
    }
}

impl TankEvent {
    /// Returns the status the tank is in after this event, if the event
    /// sets one.
    pub fn resulting_status(&self) -> Option<TankStatus> {
        match self {
            TankEvent::Created(_) => Some(TankStatus::Inactive),
            TankEvent::Activated(_) => Some(TankStatus::Active),
            TankEvent::Deactivated(_) => Some(TankStatus::Inactive),
            TankEvent::MaintenanceStarted(_) => Some(TankStatus::Maintenance),
            TankEvent::CleaningStarted(_) => Some(TankStatus::Cleaning),
            TankEvent::EmergencyDeclared(_) => Some(TankStatus::Emergency),
            TankEvent::Renamed(_) | TankEvent::SensorAdded(_) | TankEvent::SensorRemoved(_) => {
                None
            }
        }
    }

    /// Creates a TankCreated event.
    pub fn created(
        tank_id: TankId,
        name: TankName,
        location: impl Into<String>,
        capacity_liters: f64,
    ) -> Self {
        TankEvent::Created(TankCreatedData {
            tank_id,
            name,
            location: location.into(),
            capacity_liters,
        })
    }

    /// Creates a TankRenamed event.
    pub fn renamed(old_name: TankName, new_name: TankName) -> Self {
        TankEvent::Renamed(TankRenamedData { old_name, new_name })
    }

    /// Creates a SensorAdded event.
    pub fn sensor_added(sensor: &Sensor) -> Self {
        TankEvent::SensorAdded(SensorAddedData {
            sensor_id: sensor.sensor_id,
            sensor_type: sensor.sensor_type,
            label: sensor.label.clone(),
        })
    }

    /// Creates a SensorRemoved event.
    pub fn sensor_removed(sensor_id: SensorId) -> Self {
        TankEvent::SensorRemoved(SensorRemovedData { sensor_id })
    }
}

/// Data for TankCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankCreatedData {
    /// The unique tank ID.
    pub tank_id: TankId,

    pub name: TankName,

    /// Site or building the tank is in.
    pub location: String,

    /// Water volume, in liters.
    pub capacity_liters: f64,
}

/// Data for TankRenamed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankRenamedData {
    pub old_name: TankName,
    pub new_name: TankName,
}

/// Data for SensorAdded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAddedData {
    pub sensor_id: SensorId,
    pub sensor_type: SensorType,
    pub label: String,
}

/// Data for SensorRemoved event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRemovedData {
    pub sensor_id: SensorId,
}

/// Data shared by status-change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangedData {
    /// Status before the change.
    pub previous_status: TankStatus,

    /// Free-text reason given by the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatusChangedData {
    pub fn new(previous_status: TankStatus, reason: Option<String>) -> Self {
        Self {
            previous_status,
            reason,
        }
    }
}
