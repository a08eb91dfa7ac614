//! Tank list read model: one row per tank with its current status.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{TankEvent, TankId, TankStatus};
use event_store::{StoredEvent, Version};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::projection::{
    ApplyOutcome, Projection, ProjectionPosition, VersionCheck, check_version, decode_tank_event,
};
use crate::read_model::{ReadModel, TankReadModel};
use crate::Result;

/// A row of the tank read model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankRow {
    pub tank_id: TankId,
    pub name: String,
    pub location: String,
    pub capacity_liters: f64,
    pub status: TankStatus,
    pub sensor_count: u32,
    /// Version of the last tank event applied to this row.
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter over tank rows. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TankQuery {
    pub status: Option<TankStatus>,
    pub location: Option<String>,
    /// Case-insensitive substring of the tank name.
    pub name_contains: Option<String>,
}

impl TankQuery {
    /// A query matching every tank.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: TankStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_name_containing(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    /// Returns true if `row` passes every filter.
    pub fn matches(&self, row: &TankRow) -> bool {
        if self.status.is_some_and(|status| status != row.status) {
            return false;
        }
        if self
            .location
            .as_deref()
            .is_some_and(|location| location != row.location)
        {
            return false;
        }
        if let Some(fragment) = &self.name_contains {
            return row
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase());
        }
        true
    }
}

/// What applying an event does to a tank row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RowChange {
    Upsert(TankRow),
    Unchanged(ApplyOutcome),
}

/// Folds one stored event into the current row for its tank.
///
/// Shared by every tank read-model backend so they agree on the result.
pub(crate) fn fold_tank_row(current: Option<&TankRow>, event: &StoredEvent) -> Result<RowChange> {
    let Some(tank_event) = decode_tank_event(event)? else {
        return Ok(RowChange::Unchanged(ApplyOutcome::Skipped));
    };

    let last_applied = current.map_or(Version::initial(), |row| row.version);
    match check_version(last_applied, event.version) {
        VersionCheck::Duplicate => return Ok(RowChange::Unchanged(ApplyOutcome::Skipped)),
        VersionCheck::Gap => return Ok(RowChange::Unchanged(ApplyOutcome::Gap { last_applied })),
        VersionCheck::Apply => {}
    }

    let mut row = match (current, &tank_event) {
        (None, TankEvent::Created(data)) => TankRow {
            tank_id: data.tank_id,
            name: data.name.as_str().to_string(),
            location: data.location.clone(),
            capacity_liters: data.capacity_liters,
            status: TankStatus::Inactive,
            sensor_count: 0,
            version: event.version,
            created_at: event.timestamp,
            updated_at: event.timestamp,
        },
        (Some(row), _) => row.clone(),
        (None, _) => {
            tracing::warn!(
                aggregate_id = %event.aggregate_id,
                version = %event.version,
                event_type = %event.event_type,
                "tank has no TankCreated before this event, skipping"
            );
            return Ok(RowChange::Unchanged(ApplyOutcome::Skipped));
        }
    };

    match &tank_event {
        TankEvent::Renamed(data) => row.name = data.new_name.as_str().to_string(),
        TankEvent::SensorAdded(_) => row.sensor_count += 1,
        TankEvent::SensorRemoved(_) => row.sensor_count = row.sensor_count.saturating_sub(1),
        _ => {}
    }
    if let Some(status) = tank_event.resulting_status() {
        row.status = status;
    }
    row.version = event.version;
    row.updated_at = event.timestamp;

    Ok(RowChange::Upsert(row))
}

/// In-memory tank read model.
#[derive(Clone)]
pub struct TankView {
    tanks: Arc<RwLock<HashMap<TankId, TankRow>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl TankView {
    /// Creates a new empty tank view.
    pub fn new() -> Self {
        Self {
            tanks: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Gets the row of a specific tank.
    pub async fn get(&self, tank_id: TankId) -> Option<TankRow> {
        self.tanks.read().await.get(&tank_id).cloned()
    }

    /// Gets every tank, ordered by name.
    pub async fn all(&self) -> Vec<TankRow> {
        self.query(&TankQuery::all()).await
    }

    /// Gets the tanks matching `query`, ordered by name.
    pub async fn query(&self, query: &TankQuery) -> Vec<TankRow> {
        let mut rows: Vec<TankRow> = self
            .tanks
            .read()
            .await
            .values()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.tank_id.cmp(&b.tank_id)));
        rows
    }
}

impl Default for TankView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for TankView {
    fn name(&self) -> &'static str {
        "TankView"
    }

    async fn handle(&self, event: &StoredEvent) -> Result<ApplyOutcome> {
        let tank_id = TankId::from_aggregate_id(event.aggregate_id);

        // Held across the fold so two deliveries for one tank cannot interleave.
        let mut tanks = self.tanks.write().await;
        match fold_tank_row(tanks.get(&tank_id), event)? {
            RowChange::Upsert(row) => {
                tanks.insert(tank_id, row);
            }
            RowChange::Unchanged(outcome) => return Ok(outcome),
        }
        drop(tanks);

        let mut pos = self.position.write().await;
        *pos = pos.advance();

        Ok(ApplyOutcome::Applied)
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.tanks.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for TankView {
    fn name(&self) -> &'static str {
        "TankView"
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.tanks.read().await.len())
    }
}

#[async_trait]
impl TankReadModel for TankView {
    async fn get_tank(&self, tank_id: TankId) -> Result<Option<TankRow>> {
        Ok(self.get(tank_id).await)
    }

    async fn query_tanks(&self, query: &TankQuery) -> Result<Vec<TankRow>> {
        Ok(self.query(query).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::tank::events::StatusChangedData;
    use domain::{DomainEvent, Sensor, SensorId, SensorType, TankName};
    use event_store::NewEvent;

    fn stored(tank_id: TankId, version: i64, event: &TankEvent) -> StoredEvent {
        StoredEvent::from_new(
            tank_id.aggregate_id(),
            Version::new(version),
            NewEvent::new(event.event_type(), event.to_payload().unwrap()),
        )
    }

    fn created(tank_id: TankId) -> TankEvent {
        TankEvent::created(tank_id, TankName::parse("T1").unwrap(), "Hatchery", 1000.0)
    }

    fn sensor_added() -> TankEvent {
        TankEvent::sensor_added(&Sensor::new(
            SensorId::new(),
            SensorType::Temperature,
            "probe",
        ))
    }

    fn activated() -> TankEvent {
        TankEvent::Activated(StatusChangedData::new(TankStatus::Inactive, None))
    }

    #[tokio::test]
    async fn builds_row_from_lifecycle() {
        let view = TankView::new();
        let tank_id = TankId::new();

        for (version, event) in [created(tank_id), sensor_added(), activated()]
            .iter()
            .enumerate()
        {
            let outcome = view
                .handle(&stored(tank_id, version as i64 + 1, event))
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Applied);
        }

        let row = view.get(tank_id).await.unwrap();
        assert_eq!(row.name, "T1");
        assert_eq!(row.location, "Hatchery");
        assert_eq!(row.status, TankStatus::Active);
        assert_eq!(row.sensor_count, 1);
        assert_eq!(row.version, Version::new(3));
        assert_eq!(view.position().await.events_processed, 3);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_skipped() {
        let view = TankView::new();
        let tank_id = TankId::new();
        let first = stored(tank_id, 1, &created(tank_id));
        let second = stored(tank_id, 2, &sensor_added());

        view.handle(&first).await.unwrap();
        view.handle(&second).await.unwrap();
        let before = view.get(tank_id).await.unwrap();

        assert_eq!(view.handle(&second).await.unwrap(), ApplyOutcome::Skipped);
        assert_eq!(view.handle(&first).await.unwrap(), ApplyOutcome::Skipped);
        assert_eq!(view.get(tank_id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn out_of_order_delivery_reports_gap() {
        let view = TankView::new();
        let tank_id = TankId::new();

        view.handle(&stored(tank_id, 1, &created(tank_id)))
            .await
            .unwrap();
        let outcome = view
            .handle(&stored(tank_id, 3, &activated()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ApplyOutcome::Gap {
                last_applied: Version::first()
            }
        );
        assert_eq!(view.get(tank_id).await.unwrap().status, TankStatus::Inactive);
    }

    #[tokio::test]
    async fn unrelated_event_types_are_skipped() {
        let view = TankView::new();
        let event = StoredEvent::from_new(
            TankId::new().aggregate_id(),
            Version::first(),
            NewEvent::new("FeedingScheduled", serde_json::json!({})),
        );

        assert_eq!(view.handle(&event).await.unwrap(), ApplyOutcome::Skipped);
        assert_eq!(view.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stream_without_creation_is_skipped() {
        let view = TankView::new();
        let tank_id = TankId::new();
        let removed = stored(tank_id, 1, &TankEvent::sensor_removed(SensorId::new()));

        assert_eq!(view.handle(&removed).await.unwrap(), ApplyOutcome::Skipped);
        assert!(view.get(tank_id).await.is_none());
        assert_eq!(view.position().await.events_processed, 0);
    }

    #[tokio::test]
    async fn query_filters_and_orders_by_name() {
        let view = TankView::new();
        for (name, location) in [("Bravo", "North"), ("alpha", "North"), ("Charlie", "South")] {
            let tank_id = TankId::new();
            let event = TankEvent::created(tank_id, TankName::parse(name).unwrap(), location, 10.0);
            view.handle(&stored(tank_id, 1, &event)).await.unwrap();
        }

        let north = view.query(&TankQuery::all().with_location("North")).await;
        let names: Vec<_> = north.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, ["Bravo", "alpha"]);

        let found = view
            .query(&TankQuery::all().with_name_containing("ALP"))
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "alpha");

        let active = view
            .query(&TankQuery::all().with_status(TankStatus::Active))
            .await;
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn reset_clears_rows() {
        let view = TankView::new();
        let tank_id = TankId::new();
        view.handle(&stored(tank_id, 1, &created(tank_id)))
            .await
            .unwrap();

        view.reset().await.unwrap();

        assert_eq!(view.count().await.unwrap(), 0);
        assert_eq!(view.position().await, ProjectionPosition::zero());
    }
}
