//! Snapshots of a running machine instance.
//!
//! A snapshot captures configuration, history, join bookkeeping and the
//! execution context. It names its machine by id rather than by identity,
//! so it can be applied to any instance of the identical model, and it can
//! be encoded as JSON or binary when the context is serializable.

use crate::core::{RegionId, VertexId};
use crate::engine::{ActiveTree, HistoryRecord};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

pub mod error;
mod validation;

pub use error::SnapshotError;
pub use validation::{validate, SnapshotViolation};

/// Version identifier for the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Immutable capture of one machine instance.
/// Behaviors and guards are not included; they live in the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot<C> {
    /// Snapshot format version
    pub version: u32,

    /// Id of the model the snapshot was taken from
    pub state_machine_id: String,

    /// Instance the snapshot was taken from
    pub instance_id: Uuid,

    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,

    /// Copy of the execution context
    pub context: C,

    /// History records by region
    pub history: BTreeMap<RegionId, HistoryRecord>,

    /// Active configuration, one tree per top-level region; `None` unless
    /// the machine is running
    pub state_configuration: Option<Vec<ActiveTree>>,

    /// Regions entered without a resolved child
    #[serde(default)]
    pub unresolved: BTreeSet<RegionId>,

    /// Regions waiting at each join
    #[serde(default)]
    pub join_arrivals: BTreeMap<VertexId, BTreeSet<RegionId>>,

    pub is_started: bool,

    pub is_terminated: bool,
}

impl<C> Snapshot<C> {
    /// Ids of the active vertices, parents first.
    pub fn active_vertices(&self) -> Vec<VertexId> {
        self.state_configuration
            .iter()
            .flatten()
            .flat_map(ActiveTree::vertices)
            .collect()
    }

    fn check_version(version: u32) -> Result<(), SnapshotError> {
        if version == SNAPSHOT_VERSION {
            Ok(())
        } else {
            Err(SnapshotError::UnsupportedVersion {
                found: version,
                supported: SNAPSHOT_VERSION,
            })
        }
    }
}

impl<C: Serialize + DeserializeOwned> Snapshot<C> {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let raw: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        let version = raw
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| SnapshotError::DeserializationFailed("missing version".to_string()))?;
        Self::check_version(u32::try_from(version).unwrap_or(u32::MAX))?;
        serde_json::from_value(raw).map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
    }

    pub fn to_binary(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, SnapshotError> {
        // The version is the leading field, encoded as a little-endian u32.
        let version: u32 = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        Self::check_version(version)?;
        bincode::deserialize(bytes).map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;
    use crate::core::Event;
    use crate::executor::{Executor, SyncExecutor};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        items: u32,
    }

    fn running() -> SyncExecutor<Order> {
        let model = ModelBuilder::new("order")
            .initial("i")
            .state("Open", |s| {
                s.region("open.r", |r| {
                    r.initial("open.i")
                        .shallow_history("h")
                        .state("Empty", |s| s)
                        .state("Filled", |s| s)
                        .transition("open.i", "Empty", |t| t)
                        .transition("Empty", "Filled", |t| {
                            t.on("add").effect(|o: &mut Order, _e: &Event| o.items += 1)
                        })
                })
            })
            .state("Held", |s| s)
            .transition("i", "Open", |t| t)
            .transition("Open", "Held", |t| t.on("hold"))
            .transition("Held", "h", |t| t.on("release"))
            .build()
            .unwrap();
        let mut executor = SyncExecutor::new(model, Order { items: 0 }).unwrap();
        executor.go().unwrap();
        executor.take(Event::new("add")).unwrap();
        executor.take(Event::new("hold")).unwrap();
        executor
    }

    #[test]
    fn json_round_trip_preserves_everything() {
        let snapshot = running().snapshot();
        let json = snapshot.to_json().unwrap();
        let back: Snapshot<Order> = Snapshot::from_json(&json).unwrap();

        assert_eq!(back.context, Order { items: 1 });
        assert_eq!(back.history, snapshot.history);
        assert_eq!(back.state_configuration, snapshot.state_configuration);
        assert_eq!(back.instance_id, snapshot.instance_id);
        assert!(back.is_started && !back.is_terminated);
    }

    #[test]
    fn binary_round_trip_preserves_everything() {
        let snapshot = running().snapshot();
        let bytes = snapshot.to_binary().unwrap();
        let back: Snapshot<Order> = Snapshot::from_binary(&bytes).unwrap();

        assert_eq!(back.context, Order { items: 1 });
        assert_eq!(back.history, snapshot.history);
        assert_eq!(back.state_configuration, snapshot.state_configuration);
        assert_eq!(back.active_vertices(), snapshot.active_vertices());
        assert_eq!(back.taken_at, snapshot.taken_at);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut snapshot = running().snapshot();
        snapshot.version = 7;

        let json = snapshot.to_json().unwrap();
        let result = Snapshot::<Order>::from_json(&json);
        assert!(matches!(
            result,
            Err(SnapshotError::UnsupportedVersion { found: 7, .. })
        ));

        let bytes = snapshot.to_binary().unwrap();
        assert!(matches!(
            Snapshot::<Order>::from_binary(&bytes),
            Err(SnapshotError::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn garbage_input_fails_to_decode() {
        assert!(matches!(
            Snapshot::<Order>::from_json("not json"),
            Err(SnapshotError::DeserializationFailed(_))
        ));
        assert!(matches!(
            Snapshot::<Order>::from_binary(&[1, 2]),
            Err(SnapshotError::DeserializationFailed(_))
        ));
    }
}
