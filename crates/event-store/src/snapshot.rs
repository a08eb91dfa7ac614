use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, Version};

/// A cached rendering of an aggregate's state at a specific version.
///
/// There is at most one snapshot per aggregate; saving a new one replaces
/// the previous one. Snapshots are disposable: replaying the stream from
/// version 0 always reproduces the same state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Row identifier.
    pub id: Uuid,

    /// The aggregate this snapshot belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g. "Tank").
    pub aggregate_type: String,

    /// The version of the aggregate at the time of the snapshot.
    pub version: Version,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// The serialized aggregate state.
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Creates a new snapshot.
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state,
        }
    }

    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            aggregate_id,
            aggregate_type,
            version,
            serde_json::to_value(state)?,
        ))
    }

    /// Deserializes the snapshot state into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestState {
        value: i32,
        name: String,
    }

    #[test]
    fn snapshot_new() {
        let id = AggregateId::new();
        let state = serde_json::json!({"value": 42});

        let snapshot = Snapshot::new(id, "Tank", Version::new(5), state.clone());

        assert_eq!(snapshot.aggregate_id, id);
        assert_eq!(snapshot.aggregate_type, "Tank");
        assert_eq!(snapshot.version, Version::new(5));
        assert_eq!(snapshot.state, state);
    }

    #[test]
    fn snapshot_from_state_and_into_state() {
        let id = AggregateId::new();
        let original = TestState {
            value: 42,
            name: "test".to_string(),
        };

        let snapshot = Snapshot::from_state(id, "Tank", Version::new(5), &original).unwrap();

        let restored: TestState = snapshot.into_state().unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn snapshot_into_wrong_shape_fails() {
        let snapshot = Snapshot::new(
            AggregateId::new(),
            "Tank",
            Version::first(),
            serde_json::json!({"unexpected": true}),
        );

        let restored: Result<TestState, _> = snapshot.into_state();
        assert!(restored.is_err());
    }
}
