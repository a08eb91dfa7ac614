//! Tank service providing a simplified API for tank operations.

use std::sync::Arc;

use event_store::{EventStore, EventSubscriber};

use crate::command::CommandResult;
use crate::error::DomainError;
use crate::repository::{Repository, RepositoryConfig};

use super::{
    ActivateTank, AddSensor, CreateTank, DeactivateTank, DeclareEmergency, RemoveSensor,
    RenameTank, StartCleaning, StartMaintenance, Tank, TankCommand, TankError, TankId,
};

impl From<TankError> for DomainError {
    fn from(e: TankError) -> Self {
        DomainError::Tank(e)
    }
}

/// Service for managing tanks.
///
/// Provides a high-level API for tank operations, wrapping the repository
/// and mapping each command to one aggregate method.
pub struct TankService<S: EventStore> {
    repository: Repository<S, Tank>,
}

impl<S: EventStore> TankService<S> {
    /// Creates a new tank service with the default repository configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    pub fn with_config(store: S, config: RepositoryConfig) -> Self {
        Self {
            repository: Repository::with_config(store, config),
        }
    }

    /// Registers a subscriber for committed tank events.
    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.repository.subscribe(subscriber);
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &Repository<S, Tank> {
        &self.repository
    }

    /// Dispatches any tank command.
    #[tracing::instrument(skip(self, cmd), fields(command = cmd.name(), tank_id = %cmd.tank_id()))]
    pub async fn execute(&self, cmd: TankCommand) -> Result<CommandResult<Tank>, DomainError> {
        match cmd {
            TankCommand::Create(cmd) => self.create_tank(cmd).await,
            TankCommand::Rename(cmd) => self.rename_tank(cmd).await,
            TankCommand::AddSensor(cmd) => self.add_sensor(cmd).await,
            TankCommand::RemoveSensor(cmd) => self.remove_sensor(cmd).await,
            TankCommand::Activate(cmd) => self.activate_tank(cmd).await,
            TankCommand::Deactivate(cmd) => self.deactivate_tank(cmd).await,
            TankCommand::StartMaintenance(cmd) => self.start_maintenance(cmd).await,
            TankCommand::StartCleaning(cmd) => self.start_cleaning(cmd).await,
            TankCommand::DeclareEmergency(cmd) => self.declare_emergency(cmd).await,
        }
    }

    /// Creates a new tank.
    #[tracing::instrument(skip(self))]
    pub async fn create_tank(&self, cmd: CreateTank) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .create(cmd.tank_id.aggregate_id(), |tank| {
                tank.create(&cmd.name, &cmd.location, cmd.capacity_liters)
            })
            .await
    }

    /// Renames a tank.
    #[tracing::instrument(skip(self))]
    pub async fn rename_tank(&self, cmd: RenameTank) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .execute(cmd.tank_id.aggregate_id(), |tank| tank.rename(&cmd.new_name))
            .await
    }

    /// Attaches a sensor to a tank.
    #[tracing::instrument(skip(self))]
    pub async fn add_sensor(&self, cmd: AddSensor) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .execute(cmd.tank_id.aggregate_id(), |tank| {
                tank.add_sensor(cmd.sensor_id, cmd.sensor_type, &cmd.label)
            })
            .await
    }

    /// Detaches a sensor from a tank.
    #[tracing::instrument(skip(self))]
    pub async fn remove_sensor(
        &self,
        cmd: RemoveSensor,
    ) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .execute(cmd.tank_id.aggregate_id(), |tank| {
                tank.remove_sensor(cmd.sensor_id)
            })
            .await
    }

    /// Puts a tank into operation.
    #[tracing::instrument(skip(self))]
    pub async fn activate_tank(
        &self,
        cmd: ActivateTank,
    ) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .execute(cmd.tank_id.aggregate_id(), |tank| tank.activate())
            .await
    }

    /// Takes a tank out of operation.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_tank(
        &self,
        cmd: DeactivateTank,
    ) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .execute(cmd.tank_id.aggregate_id(), |tank| {
                tank.deactivate(cmd.reason.clone())
            })
            .await
    }

    /// Starts maintenance on a tank.
    #[tracing::instrument(skip(self))]
    pub async fn start_maintenance(
        &self,
        cmd: StartMaintenance,
    ) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .execute(cmd.tank_id.aggregate_id(), |tank| {
                tank.start_maintenance(cmd.reason.clone())
            })
            .await
    }

    /// Starts cleaning a tank.
    #[tracing::instrument(skip(self))]
    pub async fn start_cleaning(
        &self,
        cmd: StartCleaning,
    ) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .execute(cmd.tank_id.aggregate_id(), |tank| tank.start_cleaning())
            .await
    }

    /// Declares an emergency on a tank.
    #[tracing::instrument(skip(self))]
    pub async fn declare_emergency(
        &self,
        cmd: DeclareEmergency,
    ) -> Result<CommandResult<Tank>, DomainError> {
        self.repository
            .execute(cmd.tank_id.aggregate_id(), |tank| {
                tank.declare_emergency(cmd.reason.clone())
            })
            .await
    }

    /// Gets a tank by ID, failing with `AggregateNotFound` if it does not exist.
    pub async fn load_tank(&self, tank_id: TankId) -> Result<Tank, DomainError> {
        self.repository.load(tank_id.aggregate_id()).await
    }

    /// Gets a tank by ID.
    pub async fn get_tank(&self, tank_id: TankId) -> Result<Option<Tank>, DomainError> {
        self.repository.load_existing(tank_id.aggregate_id()).await
    }
}
