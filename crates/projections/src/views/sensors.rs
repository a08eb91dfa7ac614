//! Sensor inventory read model: every attached sensor, by tank.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{SensorId, SensorType, TankEvent, TankId};
use event_store::{StoredEvent, Version};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{
    ApplyOutcome, Projection, ProjectionPosition, VersionCheck, check_version, decode_tank_event,
};
use crate::read_model::ReadModel;

/// A sensor currently attached to a tank.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRow {
    pub sensor_id: SensorId,
    pub tank_id: TankId,
    pub sensor_type: SensorType,
    pub label: String,
    pub attached_at: DateTime<Utc>,
}

#[derive(Default)]
struct SensorState {
    /// Sensor ids are unique within a tank, not across tanks.
    sensors: HashMap<TankId, HashMap<SensorId, SensorRow>>,
    /// Last tank event version applied, per tank.
    versions: HashMap<TankId, Version>,
}

/// Read model view listing the sensors attached to each tank.
///
/// Every tank event advances the tank's version here, including events that
/// do not touch sensors, so gaps are detected the same way as in the tank
/// list.
#[derive(Clone)]
pub struct SensorView {
    state: Arc<RwLock<SensorState>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl SensorView {
    /// Creates a new empty sensor view.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SensorState::default())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Gets a specific sensor of a tank.
    pub async fn get_sensor(&self, tank_id: TankId, sensor_id: SensorId) -> Option<SensorRow> {
        self.state
            .read()
            .await
            .sensors
            .get(&tank_id)
            .and_then(|sensors| sensors.get(&sensor_id))
            .cloned()
    }

    /// Gets the sensors attached to a tank, oldest first.
    pub async fn sensors_for_tank(&self, tank_id: TankId) -> Vec<SensorRow> {
        let mut rows: Vec<SensorRow> = self
            .state
            .read()
            .await
            .sensors
            .get(&tank_id)
            .map(|sensors| sensors.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| {
            a.attached_at
                .cmp(&b.attached_at)
                .then(a.sensor_id.cmp(&b.sensor_id))
        });
        rows
    }

    /// Gets every sensor of the given type, across all tanks.
    pub async fn sensors_by_type(&self, sensor_type: SensorType) -> Vec<SensorRow> {
        self.state
            .read()
            .await
            .sensors
            .values()
            .flat_map(HashMap::values)
            .filter(|row| row.sensor_type == sensor_type)
            .cloned()
            .collect()
    }
}

impl Default for SensorView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for SensorView {
    fn name(&self) -> &'static str {
        "SensorView"
    }

    async fn handle(&self, event: &StoredEvent) -> Result<ApplyOutcome> {
        let Some(tank_event) = decode_tank_event(event)? else {
            return Ok(ApplyOutcome::Skipped);
        };
        let tank_id = TankId::from_aggregate_id(event.aggregate_id);

        let mut state = self.state.write().await;
        let last_applied = state
            .versions
            .get(&tank_id)
            .copied()
            .unwrap_or(Version::initial());

        match check_version(last_applied, event.version) {
            VersionCheck::Duplicate => return Ok(ApplyOutcome::Skipped),
            VersionCheck::Gap => return Ok(ApplyOutcome::Gap { last_applied }),
            VersionCheck::Apply => {}
        }

        match tank_event {
            TankEvent::SensorAdded(data) => {
                state.sensors.entry(tank_id).or_default().insert(
                    data.sensor_id,
                    SensorRow {
                        sensor_id: data.sensor_id,
                        tank_id,
                        sensor_type: data.sensor_type,
                        label: data.label,
                        attached_at: event.timestamp,
                    },
                );
            }
            TankEvent::SensorRemoved(data) => {
                if let Some(sensors) = state.sensors.get_mut(&tank_id) {
                    sensors.remove(&data.sensor_id);
                }
            }
            _ => {}
        }
        state.versions.insert(tank_id, event.version);
        drop(state);

        let mut pos = self.position.write().await;
        *pos = pos.advance();

        Ok(ApplyOutcome::Applied)
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = SensorState::default();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for SensorView {
    fn name(&self) -> &'static str {
        "SensorView"
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state.read().await.sensors.values().map(HashMap::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DomainEvent, Sensor, TankName};
    use event_store::NewEvent;

    fn stored(tank_id: TankId, version: i64, event: &TankEvent) -> StoredEvent {
        StoredEvent::from_new(
            tank_id.aggregate_id(),
            Version::new(version),
            NewEvent::new(event.event_type(), event.to_payload().unwrap()),
        )
    }

    #[tokio::test]
    async fn tracks_added_and_removed_sensors() {
        let view = SensorView::new();
        let tank_id = TankId::new();
        let probe = Sensor::new(SensorId::new(), SensorType::Temperature, "probe");
        let ph = Sensor::new(SensorId::new(), SensorType::Ph, "ph");

        let events = [
            TankEvent::created(tank_id, TankName::parse("T1").unwrap(), "Hatchery", 10.0),
            TankEvent::sensor_added(&probe),
            TankEvent::sensor_added(&ph),
            TankEvent::sensor_removed(probe.sensor_id),
        ];
        for (i, event) in events.iter().enumerate() {
            view.handle(&stored(tank_id, i as i64 + 1, event))
                .await
                .unwrap();
        }

        let sensors = view.sensors_for_tank(tank_id).await;
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].sensor_id, ph.sensor_id);
        assert_eq!(sensors[0].label, "ph");
        assert!(view.get_sensor(tank_id, probe.sensor_id).await.is_none());
        assert_eq!(view.sensors_by_type(SensorType::Ph).await.len(), 1);
        assert_eq!(view.position().await.events_processed, 4);
    }

    #[tokio::test]
    async fn redelivered_add_after_remove_is_skipped() {
        let view = SensorView::new();
        let tank_id = TankId::new();
        let probe = Sensor::new(SensorId::new(), SensorType::Salinity, "s");
        let added = stored(tank_id, 2, &TankEvent::sensor_added(&probe));

        view.handle(&stored(
            tank_id,
            1,
            &TankEvent::created(tank_id, TankName::parse("T1").unwrap(), "Lab", 10.0),
        ))
        .await
        .unwrap();
        view.handle(&added).await.unwrap();
        view.handle(&stored(
            tank_id,
            3,
            &TankEvent::sensor_removed(probe.sensor_id),
        ))
        .await
        .unwrap();

        assert_eq!(view.handle(&added).await.unwrap(), ApplyOutcome::Skipped);
        assert_eq!(view.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn same_sensor_id_on_two_tanks_is_tracked_per_tank() {
        let view = SensorView::new();
        let first = TankId::new();
        let second = TankId::new();
        let shared = Sensor::new(SensorId::new(), SensorType::DissolvedOxygen, "o2");

        for tank_id in [first, second] {
            let name = TankName::parse("T").unwrap();
            view.handle(&stored(
                tank_id,
                1,
                &TankEvent::created(tank_id, name, "Lab", 10.0),
            ))
            .await
            .unwrap();
            view.handle(&stored(tank_id, 2, &TankEvent::sensor_added(&shared)))
                .await
                .unwrap();
        }
        assert_eq!(view.count().await.unwrap(), 2);

        view.handle(&stored(
            second,
            3,
            &TankEvent::sensor_removed(shared.sensor_id),
        ))
        .await
        .unwrap();

        let remaining = view.sensors_for_tank(first).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].tank_id, first);
        assert!(view.get_sensor(first, shared.sensor_id).await.is_some());
        assert!(view.get_sensor(second, shared.sensor_id).await.is_none());
        assert!(view.sensors_for_tank(second).await.is_empty());
    }

    #[tokio::test]
    async fn gap_leaves_view_unchanged() {
        let view = SensorView::new();
        let tank_id = TankId::new();
        let probe = Sensor::new(SensorId::new(), SensorType::Ammonia, "nh3");

        let outcome = view
            .handle(&stored(tank_id, 2, &TankEvent::sensor_added(&probe)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ApplyOutcome::Gap {
                last_applied: Version::initial()
            }
        );
        assert_eq!(view.count().await.unwrap(), 0);
    }
}
