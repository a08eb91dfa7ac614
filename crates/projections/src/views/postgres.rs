//! PostgreSQL-backed tank read model.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{TankId, TankStatus};
use event_store::{StoredEvent, Version};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::projection::{ApplyOutcome, Projection, ProjectionPosition};
use crate::read_model::{ReadModel, TankReadModel};
use crate::views::tanks::{RowChange, TankQuery, TankRow, fold_tank_row};
use crate::{ProjectionError, Result};

const SELECT_COLUMNS: &str = "SELECT id, name, location, capacity_liters, status, sensor_count, \
     version, created_at, updated_at FROM tank_read_model";

/// Tank read model stored in the `tank_read_model` table.
///
/// Each event is applied in its own transaction with the row locked, so
/// concurrent deliveries for one tank serialize on the row. A tank with no
/// row yet has nothing to lock; the upsert only moves a row forward, so a
/// delivery that lost the race to create it is skipped.
#[derive(Clone)]
pub struct PostgresTankView {
    pool: PgPool,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl PostgresTankView {
    /// Creates a new view over the given pool. The table must already exist.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    fn row_to_tank(row: PgRow) -> Result<TankRow> {
        let status: String = row.try_get("status")?;
        let status = TankStatus::parse(&status).ok_or_else(|| {
            ProjectionError::Projection(format!("unknown tank status in read model: {status}"))
        })?;
        let sensor_count: i32 = row.try_get("sensor_count")?;

        Ok(TankRow {
            tank_id: TankId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            location: row.try_get("location")?,
            capacity_liters: row.try_get("capacity_liters")?,
            status,
            sensor_count: u32::try_from(sensor_count).unwrap_or(0),
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl Projection for PostgresTankView {
    fn name(&self) -> &'static str {
        "PostgresTankView"
    }

    #[tracing::instrument(skip(self, event), fields(aggregate_id = %event.aggregate_id, version = %event.version))]
    async fn handle(&self, event: &StoredEvent) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1 FOR UPDATE"))
            .bind(event.aggregate_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .map(Self::row_to_tank)
            .transpose()?;

        let row = match fold_tank_row(current.as_ref(), event)? {
            RowChange::Upsert(row) => row,
            // Dropping the transaction releases the row lock.
            RowChange::Unchanged(outcome) => return Ok(outcome),
        };

        let written = sqlx::query(
            r#"
            INSERT INTO tank_read_model
                (id, name, location, capacity_liters, status, sensor_count, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                location = EXCLUDED.location,
                capacity_liters = EXCLUDED.capacity_liters,
                status = EXCLUDED.status,
                sensor_count = EXCLUDED.sensor_count,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            WHERE tank_read_model.version < EXCLUDED.version
            "#,
        )
        .bind(row.tank_id.as_uuid())
        .bind(&row.name)
        .bind(&row.location)
        .bind(row.capacity_liters)
        .bind(row.status.as_str())
        .bind(i32::try_from(row.sensor_count).unwrap_or(i32::MAX))
        .bind(row.version.as_i64())
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if written == 0 {
            tracing::debug!("row already at or past this version, skipping");
            return Ok(ApplyOutcome::Skipped);
        }

        let mut pos = self.position.write().await;
        *pos = pos.advance();

        Ok(ApplyOutcome::Applied)
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        sqlx::query("TRUNCATE tank_read_model")
            .execute(&self.pool)
            .await?;
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for PostgresTankView {
    fn name(&self) -> &'static str {
        "PostgresTankView"
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tank_read_model")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl TankReadModel for PostgresTankView {
    async fn get_tank(&self, tank_id: TankId) -> Result<Option<TankRow>> {
        sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(tank_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_tank)
            .transpose()
    }

    async fn query_tanks(&self, query: &TankQuery) -> Result<Vec<TankRow>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_COLUMNS);
        builder.push(" WHERE TRUE");

        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(location) = &query.location {
            builder.push(" AND location = ").push_bind(location.clone());
        }
        if let Some(fragment) = &query.name_contains {
            builder
                .push(" AND strpos(lower(name), lower(")
                .push_bind(fragment.clone())
                .push(")) > 0");
        }
        // Byte order, to match the in-memory view.
        builder.push(r#" ORDER BY name COLLATE "C", id"#);

        builder
            .build()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::row_to_tank)
            .collect()
    }
}
