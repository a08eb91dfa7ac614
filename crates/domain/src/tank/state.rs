//! Tank status state machine.

use serde::{Deserialize, Serialize};

/// The operational status of a tank.
///
/// State transitions:
/// ```text
/// Activate          Inactive | Maintenance | Cleaning       ──► Active
/// Deactivate        Active | Maintenance | Emergency | Cleaning ──► Inactive
/// StartMaintenance  Inactive | Active | Emergency           ──► Maintenance
/// StartCleaning     Inactive | Maintenance                  ──► Cleaning
/// DeclareEmergency  Active | Maintenance | Cleaning         ──► Emergency
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TankStatus {
    /// Tank exists but is not in operation.
    #[default]
    Inactive,

    /// Tank is stocked and monitored.
    Active,

    /// Tank is under maintenance.
    Maintenance,

    /// An emergency was declared on the tank.
    Emergency,

    /// Tank is being cleaned.
    Cleaning,
}

impl TankStatus {
    /// All statuses, in declaration order.
    pub const ALL: [TankStatus; 5] = [
        TankStatus::Inactive,
        TankStatus::Active,
        TankStatus::Maintenance,
        TankStatus::Emergency,
        TankStatus::Cleaning,
    ];

    /// Returns true if the tank can be activated in this status.
    pub fn can_activate(&self) -> bool {
        matches!(
            self,
            TankStatus::Inactive | TankStatus::Maintenance | TankStatus::Cleaning
        )
    }

    /// Returns true if the tank can be deactivated in this status.
    pub fn can_deactivate(&self) -> bool {
        !matches!(self, TankStatus::Inactive)
    }

    /// Returns true if maintenance can start in this status.
    pub fn can_start_maintenance(&self) -> bool {
        matches!(
            self,
            TankStatus::Inactive | TankStatus::Active | TankStatus::Emergency
        )
    }

    /// Returns true if cleaning can start in this status.
    pub fn can_start_cleaning(&self) -> bool {
        matches!(self, TankStatus::Inactive | TankStatus::Maintenance)
    }

    /// Returns true if an emergency can be declared in this status.
    pub fn can_declare_emergency(&self) -> bool {
        matches!(
            self,
            TankStatus::Active | TankStatus::Maintenance | TankStatus::Cleaning
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TankStatus::Inactive => "Inactive",
            TankStatus::Active => "Active",
            TankStatus::Maintenance => "Maintenance",
            TankStatus::Emergency => "Emergency",
            TankStatus::Cleaning => "Cleaning",
        }
    }

    /// Parses a status name as produced by [`TankStatus::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl std::fmt::Display for TankStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
