//! AquaControl core application.
//!
//! Wires the event store, the tank service and the projections together
//! behind [`Application`], the single entry point used by command and query
//! handlers. Also provides configuration and telemetry setup for the binary.

pub mod config;
pub mod error;
pub mod telemetry;

use std::future::Future;
use std::sync::Arc;

use domain::{Aggregate, DomainError, Tank, TankCommand, TankId, TankService};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore, Version};
use projections::{
    EventNotifier, Notification, PendingProjection, PostgresTankView, Projection,
    ProjectionError, ProjectionProcessor, SensorRow, SensorView, TankQuery, TankReadModel,
    TankRow, TankView,
};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;

pub use config::{Config, ConfigError, LogFormat};
pub use error::AppError;

/// Buffered notifications per subscriber before it starts lagging.
const NOTIFICATION_CAPACITY: usize = 1024;

/// Result of a successfully executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub tank_id: TankId,
    /// Aggregate version after the command. Unchanged for a no-op command.
    pub new_version: Version,
    /// Number of events the command appended.
    pub events_appended: usize,
}

/// The assembled core: command side, projections and notifications.
pub struct Application<S: EventStore> {
    config: Config,
    service: TankService<S>,
    processor: Arc<ProjectionProcessor<S>>,
    tanks: Arc<dyn TankReadModel>,
    sensors: SensorView,
    notifier: EventNotifier,
}

impl Application<InMemoryEventStore> {
    /// Builds an application backed by an in-memory store and read models.
    pub fn in_memory(config: Config) -> Self {
        let tanks = TankView::new();
        Self::assemble(
            config,
            InMemoryEventStore::new(),
            Box::new(tanks.clone()),
            Arc::new(tanks),
        )
    }
}

impl Application<PostgresEventStore> {
    /// Connects to `config.database_url`, runs migrations and builds an
    /// application whose log and tank read model live in PostgreSQL.
    #[tracing::instrument(skip(config))]
    pub async fn postgres(config: Config) -> Result<Self, AppError> {
        let url = config
            .database_url
            .clone()
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&url)
            .await?;

        let store = PostgresEventStore::new(pool.clone());
        store.run_migrations().await?;
        tracing::info!("connected to PostgreSQL, migrations applied");

        let tanks = PostgresTankView::new(pool);
        Ok(Self::assemble(
            config,
            store,
            Box::new(tanks.clone()),
            Arc::new(tanks),
        ))
    }
}

impl<S: EventStore + Clone + 'static> Application<S> {
    fn assemble(
        config: Config,
        store: S,
        tank_projection: Box<dyn Projection>,
        tanks: Arc<dyn TankReadModel>,
    ) -> Self {
        let sensors = SensorView::new();
        let notifier = EventNotifier::new(NOTIFICATION_CAPACITY);

        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(tank_projection);
        processor.register(Box::new(sensors.clone()));
        let processor = Arc::new(processor);

        // Read models first, so a notified listener can query its change.
        let mut service = TankService::with_config(store, config.repository_config());
        service.subscribe(processor.clone());
        service.subscribe(Arc::new(notifier.clone()));

        Self {
            config,
            service,
            processor,
            tanks,
            sensors,
            notifier,
        }
    }

    /// Returns the configuration the application was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the tank service.
    pub fn service(&self) -> &TankService<S> {
        &self.service
    }

    /// Returns the projection processor.
    pub fn processor(&self) -> &Arc<ProjectionProcessor<S>> {
        &self.processor
    }

    /// Loads a tank from the event log.
    pub async fn load_tank(&self, tank_id: TankId) -> Result<Tank, DomainError> {
        self.service.load_tank(tank_id).await
    }

    /// Executes a command and persists its events.
    pub async fn execute(&self, cmd: TankCommand) -> Result<CommandOutcome, DomainError> {
        let tank_id = cmd.tank_id();
        let result = self.service.execute(cmd).await?;
        Ok(CommandOutcome {
            tank_id,
            new_version: result.aggregate.version(),
            events_appended: result.events.len(),
        })
    }

    /// Queries the tank read model. Results may lag the event log while
    /// projection retries are pending.
    pub async fn query_tanks(&self, query: &TankQuery) -> Result<Vec<TankRow>, ProjectionError> {
        self.tanks.query_tanks(query).await
    }

    /// Gets one tank row from the read model.
    pub async fn get_tank_row(&self, tank_id: TankId) -> Result<Option<TankRow>, ProjectionError> {
        self.tanks.get_tank(tank_id).await
    }

    /// Lists the sensors attached to a tank, from the read model.
    pub async fn sensors_for_tank(&self, tank_id: TankId) -> Vec<SensorRow> {
        self.sensors.sensors_for_tank(tank_id).await
    }

    /// Subscribes to events committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Brings every read model up to date with the event log.
    pub async fn catch_up(&self) -> Result<u64, ProjectionError> {
        self.processor.run_catch_up().await
    }

    /// Retries failed projection deliveries once.
    pub async fn retry_pending(&self) -> usize {
        self.processor.retry_pending().await
    }

    /// Returns the deliveries waiting to be retried.
    pub async fn pending_projections(&self) -> Vec<PendingProjection> {
        self.processor.pending().await
    }

    /// Retries pending projections every `projection_retry_interval` until
    /// `shutdown` completes.
    ///
    /// A retry pass in progress when `shutdown` fires is dropped at its next
    /// await point; read-model writes are per event, so nothing is left
    /// half-applied.
    pub async fn run_retry_loop<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.projection_retry_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    let resolved = self.retry_pending().await;
                    if resolved > 0 {
                        tracing::debug!(resolved, "retry pass finished");
                    }
                }
            }
        }

        let remaining = self.processor.pending().await.len();
        if remaining > 0 {
            tracing::warn!(remaining, "stopping with projection retries still pending");
        }
    }
}
