//! Read model traits for query-side views.

use async_trait::async_trait;
use domain::TankId;

use crate::Result;
use crate::views::{TankQuery, TankRow};

/// A read model providing query access to denormalized data.
///
/// Read models are derived caches: they are updated by projections and can
/// always be rebuilt from the event log.
#[async_trait]
pub trait ReadModel: Send + Sync {
    /// Returns the name of this read model.
    fn name(&self) -> &'static str;

    /// Returns the number of entries in this read model.
    async fn count(&self) -> Result<usize>;
}

/// Queries over the tank read model, whatever its backing storage.
#[async_trait]
pub trait TankReadModel: ReadModel {
    /// Gets a single tank row.
    async fn get_tank(&self, tank_id: TankId) -> Result<Option<TankRow>>;

    /// Gets the rows matching `query`, ordered by name.
    async fn query_tanks(&self, query: &TankQuery) -> Result<Vec<TankRow>>;
}
