use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventId, EventStoreError, NewEvent, Result, Snapshot, StoredEvent, Version,
    store::{EventStore, EventStream, assign_versions, validate_events_for_append},
};

/// Name of the unique `(aggregate_id, version)` constraint on the events table.
const UNIQUE_AGGREGATE_VERSION: &str = "unique_aggregate_version";

/// PostgreSQL-backed event store implementation.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<StoredEvent> {
        Ok(StoredEvent {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
        })
    }

    async fn current_version(&self, aggregate_id: AggregateId) -> Result<Version> {
        Ok(self
            .get_aggregate_version(aggregate_id)
            .await?
            .unwrap_or(Version::initial()))
    }
}

fn is_version_collision(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.constraint() == Some(UNIQUE_AGGREGATE_VERSION)
    )
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn save_events(
        &self,
        aggregate_id: AggregateId,
        events: Vec<NewEvent>,
        expected_version: Version,
    ) -> Result<Vec<StoredEvent>> {
        validate_events_for_append(&events, expected_version)?;

        let mut tx = self.pool.begin().await?;

        // Catches an expected version ahead of the stream, which the unique
        // constraint alone cannot see.
        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let actual = Version::new(current.unwrap_or(0));

        if actual != expected_version {
            metrics::counter!("event_store_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let stored = assign_versions(aggregate_id, events, expected_version);

        for event in &stored {
            let inserted = sqlx::query(
                r#"
                INSERT INTO events (id, aggregate_id, event_type, payload, version, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(event.id.as_uuid())
            .bind(aggregate_id.as_uuid())
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                if is_version_collision(&e) {
                    // A concurrent writer committed first; the transaction
                    // rolls back on drop so nothing of this batch is kept.
                    drop(tx);
                    metrics::counter!("event_store_conflicts_total").increment(1);
                    let actual = self.current_version(aggregate_id).await?;
                    return Err(EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual,
                    });
                }
                return Err(EventStoreError::Database(e));
            }
        }

        tx.commit().await?;

        metrics::counter!("event_store_events_appended_total").increment(stored.len() as u64);
        Ok(stored)
    }

    async fn get_events(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, event_type, payload, version, timestamp
            FROM events
            WHERE aggregate_id = $1 AND version > $2
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT id, aggregate_id, event_type, payload, version, timestamp
            FROM events
            ORDER BY aggregate_id ASC, version ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_event(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let stored_version = self.current_version(snapshot.aggregate_id).await?;
        if snapshot.version > stored_version {
            return Err(EventStoreError::InvalidSnapshot {
                aggregate_id: snapshot.aggregate_id,
                snapshot_version: snapshot.version,
                stored_version,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO snapshots (id, aggregate_id, aggregate_type, state, version, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (aggregate_id) DO UPDATE SET
                id = EXCLUDED.id,
                aggregate_type = EXCLUDED.aggregate_type,
                state = EXCLUDED.state,
                version = EXCLUDED.version,
                timestamp = EXCLUDED.timestamp
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.aggregate_id.as_uuid())
        .bind(&snapshot.aggregate_type)
        .bind(&snapshot.state)
        .bind(snapshot.version.as_i64())
        .bind(snapshot.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, aggregate_id, aggregate_type, state, version, timestamp
            FROM snapshots
            WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                id: row.try_get("id")?,
                aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
                aggregate_type: row.try_get("aggregate_type")?,
                version: Version::new(row.try_get("version")?),
                timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                state: row.try_get("state")?,
            })),
            None => Ok(None),
        }
    }
}
