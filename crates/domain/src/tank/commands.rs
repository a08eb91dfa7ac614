//! Tank commands.

use common::AggregateId;

use crate::command::Command;

use super::{SensorId, SensorType, Tank, TankId};

/// Command to create a new tank.
#[derive(Debug, Clone)]
pub struct CreateTank {
    /// The tank ID to create.
    pub tank_id: TankId,

    pub name: String,

    pub location: String,

    pub capacity_liters: f64,
}

impl CreateTank {
    /// Creates a new CreateTank command with a generated tank ID.
    pub fn new(name: impl Into<String>, location: impl Into<String>, capacity_liters: f64) -> Self {
        Self {
            tank_id: TankId::new(),
            name: name.into(),
            location: location.into(),
            capacity_liters,
        }
    }

    /// Uses the given tank ID instead of a generated one.
    pub fn with_id(mut self, tank_id: TankId) -> Self {
        self.tank_id = tank_id;
        self
    }
}

/// Command to rename a tank.
#[derive(Debug, Clone)]
pub struct RenameTank {
    pub tank_id: TankId,
    pub new_name: String,
}

impl RenameTank {
    pub fn new(tank_id: TankId, new_name: impl Into<String>) -> Self {
        Self {
            tank_id,
            new_name: new_name.into(),
        }
    }
}

/// Command to attach a sensor to a tank.
#[derive(Debug, Clone)]
pub struct AddSensor {
    pub tank_id: TankId,
    pub sensor_id: SensorId,
    pub sensor_type: SensorType,
    pub label: String,
}

impl AddSensor {
    /// Creates a new AddSensor command with a generated sensor ID.
    pub fn new(tank_id: TankId, sensor_type: SensorType, label: impl Into<String>) -> Self {
        Self {
            tank_id,
            sensor_id: SensorId::new(),
            sensor_type,
            label: label.into(),
        }
    }

    /// Uses the given sensor ID instead of a generated one.
    pub fn with_sensor_id(mut self, sensor_id: SensorId) -> Self {
        self.sensor_id = sensor_id;
        self
    }
}

/// Command to detach a sensor from a tank.
#[derive(Debug, Clone)]
pub struct RemoveSensor {
    pub tank_id: TankId,
    pub sensor_id: SensorId,
}

impl RemoveSensor {
    pub fn new(tank_id: TankId, sensor_id: SensorId) -> Self {
        Self { tank_id, sensor_id }
    }
}

/// Command to put a tank into operation.
#[derive(Debug, Clone)]
pub struct ActivateTank {
    pub tank_id: TankId,
}

impl ActivateTank {
    pub fn new(tank_id: TankId) -> Self {
        Self { tank_id }
    }
}

/// Command to take a tank out of operation.
#[derive(Debug, Clone)]
pub struct DeactivateTank {
    pub tank_id: TankId,
    pub reason: Option<String>,
}

impl DeactivateTank {
    pub fn new(tank_id: TankId) -> Self {
        Self {
            tank_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Command to start maintenance on a tank.
#[derive(Debug, Clone)]
pub struct StartMaintenance {
    pub tank_id: TankId,
    pub reason: Option<String>,
}

impl StartMaintenance {
    pub fn new(tank_id: TankId) -> Self {
        Self {
            tank_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Command to start cleaning a tank.
#[derive(Debug, Clone)]
pub struct StartCleaning {
    pub tank_id: TankId,
}

impl StartCleaning {
    pub fn new(tank_id: TankId) -> Self {
        Self { tank_id }
    }
}

/// Command to declare an emergency on a tank.
#[derive(Debug, Clone)]
pub struct DeclareEmergency {
    pub tank_id: TankId,
    pub reason: Option<String>,
}

impl DeclareEmergency {
    pub fn new(tank_id: TankId, reason: impl Into<String>) -> Self {
        Self {
            tank_id,
            reason: Some(reason.into()),
        }
    }
}

/// Any tank command, for callers that dispatch on a single type.
#[derive(Debug, Clone)]
pub enum TankCommand {
    Create(CreateTank),
    Rename(RenameTank),
    AddSensor(AddSensor),
    RemoveSensor(RemoveSensor),
    Activate(ActivateTank),
    Deactivate(DeactivateTank),
    StartMaintenance(StartMaintenance),
    StartCleaning(StartCleaning),
    DeclareEmergency(DeclareEmergency),
}

impl TankCommand {
    /// Returns the targeted tank.
    pub fn tank_id(&self) -> TankId {
        match self {
            TankCommand::Create(cmd) => cmd.tank_id,
            TankCommand::Rename(cmd) => cmd.tank_id,
            TankCommand::AddSensor(cmd) => cmd.tank_id,
            TankCommand::RemoveSensor(cmd) => cmd.tank_id,
            TankCommand::Activate(cmd) => cmd.tank_id,
            TankCommand::Deactivate(cmd) => cmd.tank_id,
            TankCommand::StartMaintenance(cmd) => cmd.tank_id,
            TankCommand::StartCleaning(cmd) => cmd.tank_id,
            TankCommand::DeclareEmergency(cmd) => cmd.tank_id,
        }
    }

    /// Returns the command name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            TankCommand::Create(_) => "CreateTank",
            TankCommand::Rename(_) => "RenameTank",
            TankCommand::AddSensor(_) => "AddSensor",
            TankCommand::RemoveSensor(_) => "RemoveSensor",
            TankCommand::Activate(_) => "ActivateTank",
            TankCommand::Deactivate(_) => "DeactivateTank",
            TankCommand::StartMaintenance(_) => "StartMaintenance",
            TankCommand::StartCleaning(_) => "StartCleaning",
            TankCommand::DeclareEmergency(_) => "DeclareEmergency",
        }
    }
}

impl Command for TankCommand {
    type Aggregate = Tank;

    fn aggregate_id(&self) -> AggregateId {
        self.tank_id().aggregate_id()
    }
}

macro_rules! tank_command {
    ($($command:ident => $variant:ident),* $(,)?) => {
        $(
            impl Command for $command {
                type Aggregate = Tank;

                fn aggregate_id(&self) -> AggregateId {
                    self.tank_id.aggregate_id()
                }
            }

            impl From<$command> for TankCommand {
                fn from(cmd: $command) -> Self {
                    TankCommand::$variant(cmd)
                }
            }
        )*
    };
}

tank_command! {
    CreateTank => Create,
    RenameTank => Rename,
    AddSensor => AddSensor,
    RemoveSensor => RemoveSensor,
    ActivateTank => Activate,
    DeactivateTank => Deactivate,
    StartMaintenance => StartMaintenance,
    StartCleaning => StartCleaning,
    DeclareEmergency => DeclareEmergency,
}
