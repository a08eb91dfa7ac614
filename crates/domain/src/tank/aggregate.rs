//! Tank aggregate implementation.

use std::collections::BTreeMap;

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, AggregateCore};

use super::{
    Sensor, SensorId, SensorType, TankError, TankEvent, TankName, TankStatus,
    events::{SensorAddedData, StatusChangedData, TankCreatedData},
};

/// Tank aggregate root.
///
/// A tank holds a set of sensors and moves through the statuses described
/// by [`TankStatus`]. A tank is never deleted; deactivation is itself an
/// event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    core: AggregateCore<TankEvent>,

    name: Option<TankName>,

    location: String,

    capacity_liters: f64,

    status: TankStatus,

    /// Attached sensors, keyed by sensor ID.
    sensors: BTreeMap<SensorId, Sensor>,
}

impl Aggregate for Tank {
    type Event = TankEvent;
    type Error = TankError;

    fn aggregate_type() -> &'static str {
        "Tank"
    }

    fn new(id: AggregateId) -> Self {
        Self {
            core: AggregateCore::new(id),
            name: None,
            location: String::new(),
            capacity_liters: 0.0,
            status: TankStatus::default(),
            sensors: BTreeMap::new(),
        }
    }

    fn core(&self) -> &AggregateCore<TankEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AggregateCore<TankEvent> {
        &mut self.core
    }

    fn when(&mut self, event: &TankEvent) {
        if let Some(status) = event.resulting_status() {
            self.status = status;
        }

        match event {
            TankEvent::Created(data) => self.when_created(data),
            TankEvent::Renamed(data) => self.name = Some(data.new_name.clone()),
            TankEvent::SensorAdded(data) => self.when_sensor_added(data),
            TankEvent::SensorRemoved(data) => {
                self.sensors.remove(&data.sensor_id);
            }
            TankEvent::Activated(_)
            | TankEvent::Deactivated(_)
            | TankEvent::MaintenanceStarted(_)
            | TankEvent::CleaningStarted(_)
            | TankEvent::EmergencyDeclared(_) => {}
        }
    }
}

// Query methods
impl Tank {
    /// Returns the tank name. Empty for a tank that was never created.
    pub fn name(&self) -> &str {
        self.name.as_ref().map(TankName::as_str).unwrap_or_default()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn capacity_liters(&self) -> f64 {
        self.capacity_liters
    }

    pub fn status(&self) -> TankStatus {
        self.status
    }

    /// Returns the attached sensors, ordered by ID.
    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.values()
    }

    pub fn sensor(&self, sensor_id: &SensorId) -> Option<&Sensor> {
        self.sensors.get(sensor_id)
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }
}

// Command methods
impl Tank {
    /// Creates the tank.
    pub fn create(
        &mut self,
        name: &str,
        location: &str,
        capacity_liters: f64,
    ) -> Result<(), TankError> {
        if !self.is_new() {
            return Err(TankError::AlreadyCreated);
        }

        let name = TankName::parse(name)?;

        let location = location.trim();
        if location.is_empty() {
            return Err(TankError::InvalidLocation);
        }

        if !capacity_liters.is_finite() || capacity_liters <= 0.0 {
            return Err(TankError::InvalidCapacity { capacity_liters });
        }

        let tank_id = super::TankId::from_aggregate_id(self.id());
        self.apply(TankEvent::created(tank_id, name, location, capacity_liters));
        Ok(())
    }

    /// Renames the tank. Renaming to the current name records nothing.
    pub fn rename(&mut self, new_name: &str) -> Result<(), TankError> {
        let current = self.existing_name()?.clone();
        let new_name = TankName::parse(new_name)?;

        if new_name == current {
            return Ok(());
        }

        self.apply(TankEvent::renamed(current, new_name));
        Ok(())
    }

    /// Attaches a sensor.
    pub fn add_sensor(
        &mut self,
        sensor_id: SensorId,
        sensor_type: SensorType,
        label: &str,
    ) -> Result<(), TankError> {
        self.ensure_created()?;

        if self.sensors.contains_key(&sensor_id) {
            return Err(TankError::DuplicateSensor { sensor_id });
        }

        let sensor = Sensor::new(sensor_id, sensor_type, label.trim());
        self.apply(TankEvent::sensor_added(&sensor));
        Ok(())
    }

    /// Detaches a sensor. An active tank must keep at least one sensor.
    pub fn remove_sensor(&mut self, sensor_id: SensorId) -> Result<(), TankError> {
        self.ensure_created()?;

        if !self.sensors.contains_key(&sensor_id) {
            return Err(TankError::SensorNotFound { sensor_id });
        }

        if self.status == TankStatus::Active && self.sensors.len() == 1 {
            return Err(TankError::LastSensorOnActiveTank { sensor_id });
        }

        self.apply(TankEvent::sensor_removed(sensor_id));
        Ok(())
    }

    /// Puts the tank into operation. Requires at least one sensor.
    pub fn activate(&mut self) -> Result<(), TankError> {
        self.ensure_transition(self.status.can_activate(), "activate")?;

        if self.sensors.is_empty() {
            return Err(TankError::NoSensors);
        }

        self.apply(TankEvent::Activated(self.status_change(None)));
        Ok(())
    }

    /// Takes the tank out of operation.
    pub fn deactivate(&mut self, reason: Option<String>) -> Result<(), TankError> {
        self.ensure_transition(self.status.can_deactivate(), "deactivate")?;
        self.apply(TankEvent::Deactivated(self.status_change(reason)));
        Ok(())
    }

    /// Starts maintenance.
    pub fn start_maintenance(&mut self, reason: Option<String>) -> Result<(), TankError> {
        self.ensure_transition(self.status.can_start_maintenance(), "start maintenance")?;
        self.apply(TankEvent::MaintenanceStarted(self.status_change(reason)));
        Ok(())
    }

    /// Starts cleaning.
    pub fn start_cleaning(&mut self) -> Result<(), TankError> {
        self.ensure_transition(self.status.can_start_cleaning(), "start cleaning")?;
        self.apply(TankEvent::CleaningStarted(self.status_change(None)));
        Ok(())
    }

    /// Declares an emergency.
    pub fn declare_emergency(&mut self, reason: Option<String>) -> Result<(), TankError> {
        self.ensure_transition(self.status.can_declare_emergency(), "declare emergency")?;
        self.apply(TankEvent::EmergencyDeclared(self.status_change(reason)));
        Ok(())
    }
}

// Helpers
impl Tank {
    fn ensure_created(&self) -> Result<(), TankError> {
        if self.is_new() {
            return Err(TankError::NotCreated);
        }
        Ok(())
    }

    fn existing_name(&self) -> Result<&TankName, TankError> {
        self.name.as_ref().ok_or(TankError::NotCreated)
    }

    fn ensure_transition(&self, allowed: bool, action: &'static str) -> Result<(), TankError> {
        self.ensure_created()?;
        if !allowed {
            return Err(TankError::InvalidStateTransition {
                current_status: self.status,
                action,
            });
        }
        Ok(())
    }

    fn status_change(&self, reason: Option<String>) -> StatusChangedData {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        StatusChangedData::new(self.status, reason)
    }

    fn when_created(&mut self, data: &TankCreatedData) {
        self.name = Some(data.name.clone());
        self.location = data.location.clone();
        self.capacity_liters = data.capacity_liters;
    }

    fn when_sensor_added(&mut self, data: &SensorAddedData) {
        self.sensors.insert(
            data.sensor_id,
            Sensor::new(data.sensor_id, data.sensor_type, data.label.clone()),
        );
    }
}
