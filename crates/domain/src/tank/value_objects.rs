//! Value objects for the tank domain.

use common::AggregateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TankError;

/// Maximum length of a tank name, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// Unique identifier for a tank.
///
/// Conversions to and from the generic [`AggregateId`] are explicit so that
/// a tank ID cannot be passed where another kind of ID is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TankId(Uuid);

impl TankId {
    /// Creates a new random tank ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a tank ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Reinterprets a stream ID as a tank ID.
    pub fn from_aggregate_id(id: AggregateId) -> Self {
        Self(id.as_uuid())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the ID of the tank's event stream.
    pub fn aggregate_id(&self) -> AggregateId {
        AggregateId::from_uuid(self.0)
    }
}

impl Default for TankId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a sensor attached to a tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(Uuid);

impl SensorId {
    /// Creates a new random sensor ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a sensor ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SensorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated tank name: non-blank, at most [`MAX_NAME_LENGTH`] characters,
/// surrounding whitespace trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TankName(String);

impl TankName {
    pub fn parse(name: impl AsRef<str>) -> Result<Self, TankError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TankError::InvalidName {
                reason: "name must not be empty",
            });
        }
        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(TankError::InvalidName {
                reason: "name must be at most 100 characters",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TankName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a sensor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    Temperature,
    Ph,
    DissolvedOxygen,
    Salinity,
    Ammonia,
    WaterLevel,
}

impl SensorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "Temperature",
            SensorType::Ph => "Ph",
            SensorType::DissolvedOxygen => "DissolvedOxygen",
            SensorType::Salinity => "Salinity",
            SensorType::Ammonia => "Ammonia",
            SensorType::WaterLevel => "WaterLevel",
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sensor attached to a tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub sensor_id: SensorId,
    pub sensor_type: SensorType,
    pub label: String,
}

impl Sensor {
    pub fn new(sensor_id: SensorId, sensor_type: SensorType, label: impl Into<String>) -> Self {
        Self {
            sensor_id,
            sensor_type,
            label: label.into(),
        }
    }
}
