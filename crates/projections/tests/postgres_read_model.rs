//! PostgreSQL read model tests
//!
//! These tests need a running Docker daemon, so they are ignored by default.
//! Run with:
//!
//! ```bash
//! cargo test -p projections --test postgres_read_model -- --ignored --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use domain::{
    ActivateTank, AddSensor, CreateTank, RenameTank, SensorType, TankService, TankStatus,
};
use event_store::{EventStoreExt, PostgresEventStore, Version};
use projections::{
    ApplyOutcome, Projection, PostgresTankView, ProjectionProcessor, ReadModel, TankQuery,
    TankReadModel, TankView,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = sqlx::PgPool::connect(&connection_string).await.unwrap();
            PostgresEventStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool with every table emptied.
async fn get_test_pool() -> sqlx::PgPool {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE events, snapshots, tank_read_model")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

#[tokio::test]
#[ignore]
async fn postgres_view_follows_commands() {
    let pool = get_test_pool().await;
    let store = PostgresEventStore::new(pool.clone());
    let view = PostgresTankView::new(pool);

    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(view.clone()));
    let mut service = TankService::new(store);
    service.subscribe(Arc::new(processor));

    let cmd = CreateTank::new("T1", "Hatchery", 1000.0);
    let tank_id = cmd.tank_id;
    service.create_tank(cmd).await.unwrap();
    service
        .add_sensor(AddSensor::new(tank_id, SensorType::Temperature, "probe"))
        .await
        .unwrap();
    service
        .activate_tank(ActivateTank::new(tank_id))
        .await
        .unwrap();
    service
        .rename_tank(RenameTank::new(tank_id, "Broodstock"))
        .await
        .unwrap();

    let row = view.get_tank(tank_id).await.unwrap().unwrap();
    assert_eq!(row.name, "Broodstock");
    assert_eq!(row.status, TankStatus::Active);
    assert_eq!(row.sensor_count, 1);
    assert_eq!(row.version.as_i64(), 4);

    let active = view
        .query_tanks(&TankQuery::all().with_status(TankStatus::Active))
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    let none = view
        .query_tanks(&TankQuery::all().with_location("Quarantine"))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
#[ignore]
async fn postgres_view_skips_duplicates() {
    let pool = get_test_pool().await;
    let store = PostgresEventStore::new(pool.clone());
    let view = PostgresTankView::new(pool);
    let service = TankService::new(store.clone());

    let cmd = CreateTank::new("T1", "Hatchery", 1000.0);
    let tank_id = cmd.tank_id;
    service.create_tank(cmd).await.unwrap();
    let events = store.get_all_events(tank_id.aggregate_id()).await.unwrap();

    assert_eq!(view.handle(&events[0]).await.unwrap(), ApplyOutcome::Applied);
    assert_eq!(view.handle(&events[0]).await.unwrap(), ApplyOutcome::Skipped);
    assert_eq!(view.count().await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn postgres_and_memory_views_agree_after_rebuild() {
    let pool = get_test_pool().await;
    let store = PostgresEventStore::new(pool.clone());
    let service = TankService::new(store.clone());

    for name in ["alpha", "Bravo", "Charlie"] {
        let cmd = CreateTank::new(name, "Hatchery", 500.0);
        let tank_id = cmd.tank_id;
        service.create_tank(cmd).await.unwrap();
        service
            .add_sensor(AddSensor::new(tank_id, SensorType::Ph, "ph"))
            .await
            .unwrap();
    }

    let postgres_view = PostgresTankView::new(pool);
    let memory_view = TankView::new();
    let mut processor = ProjectionProcessor::new(store);
    processor.register(Box::new(postgres_view.clone()));
    processor.register(Box::new(memory_view.clone()));

    processor.rebuild_all().await.unwrap();

    let from_postgres = postgres_view.query_tanks(&TankQuery::all()).await.unwrap();
    let from_memory = memory_view.all().await;
    assert_eq!(from_postgres, from_memory);
}

#[tokio::test]
#[ignore]
async fn postgres_view_never_moves_a_row_back() {
    let pool = get_test_pool().await;
    let store = PostgresEventStore::new(pool.clone());
    let service = TankService::new(store.clone());
    let view = PostgresTankView::new(pool.clone());

    let cmd = CreateTank::new("T1", "Hatchery", 1000.0);
    let tank_id = cmd.tank_id;
    service.create_tank(cmd).await.unwrap();
    service
        .rename_tank(RenameTank::new(tank_id, "T2"))
        .await
        .unwrap();
    let events = store.get_all_events(tank_id.aggregate_id()).await.unwrap();

    let memory_view = TankView::new();
    for event in &events {
        memory_view.handle(event).await.unwrap();
    }
    let latest = memory_view.get(tank_id).await.unwrap();

    // Another writer inserts the v2 row but has not committed yet, so the
    // v1 delivery below finds no row to lock.
    let mut other = pool.begin().await.unwrap();
    sqlx::query(
        "INSERT INTO tank_read_model \
         (id, name, location, capacity_liters, status, sensor_count, version, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(tank_id.as_uuid())
    .bind(&latest.name)
    .bind(&latest.location)
    .bind(latest.capacity_liters)
    .bind(latest.status.as_str())
    .bind(latest.sensor_count as i32)
    .bind(latest.version.as_i64())
    .bind(latest.created_at)
    .bind(latest.updated_at)
    .execute(&mut *other)
    .await
    .unwrap();

    let late = {
        let view = view.clone();
        let first = events[0].clone();
        tokio::spawn(async move { view.handle(&first).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    other.commit().await.unwrap();

    assert_eq!(late.await.unwrap().unwrap(), ApplyOutcome::Skipped);
    let row = view.get_tank(tank_id).await.unwrap().unwrap();
    assert_eq!(row.version, Version::new(2));
    assert_eq!(row.name, "T2");
}
