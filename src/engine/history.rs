//! Shallow and deep history records.
//!
//! A region that owns a history pseudostate gets its sub-configuration
//! recorded every time it is exited. Re-entering through the pseudostate
//! restores the record instead of following the default entry.

use super::configuration::ActiveTree;
use crate::core::{HistoryDepth, RegionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration of a region at the moment it was last exited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Recorded sub-configuration; shallow records carry no children.
    pub tree: ActiveTree,
    /// When the region was exited.
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(tree: ActiveTree) -> Self {
        Self {
            tree,
            recorded_at: Utc::now(),
        }
    }
}

/// Per-region history of one machine instance.
#[derive(Clone, Debug, Default)]
pub(crate) struct HistoryStore {
    records: BTreeMap<RegionId, HistoryRecord>,
}

impl HistoryStore {
    /// Record the sub-configuration of `tree.region`, overwriting any
    /// earlier record.
    pub(crate) fn record(&mut self, tree: &ActiveTree, depth: HistoryDepth) {
        let tree = match depth {
            HistoryDepth::Shallow => tree.shallow(),
            HistoryDepth::Deep => tree.clone(),
        };
        self.records.insert(tree.region, HistoryRecord::new(tree));
    }

    pub(crate) fn get(&self, region: RegionId) -> Option<&HistoryRecord> {
        self.records.get(&region)
    }

    pub(crate) fn records(&self) -> &BTreeMap<RegionId, HistoryRecord> {
        &self.records
    }

    pub(crate) fn replace(&mut self, records: BTreeMap<RegionId, HistoryRecord>) {
        self.records = records;
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VertexId;

    fn nested() -> ActiveTree {
        ActiveTree {
            region: RegionId(1),
            vertex: VertexId(2),
            children: vec![ActiveTree {
                region: RegionId(2),
                vertex: VertexId(3),
                children: Vec::new(),
            }],
        }
    }

    #[test]
    fn shallow_record_keeps_only_the_child() {
        let mut store = HistoryStore::default();
        store.record(&nested(), HistoryDepth::Shallow);

        let record = store.get(RegionId(1)).unwrap();
        assert_eq!(record.tree.vertex, VertexId(2));
        assert!(record.tree.children.is_empty());
    }

    #[test]
    fn deep_record_keeps_the_subtree() {
        let mut store = HistoryStore::default();
        store.record(&nested(), HistoryDepth::Deep);

        assert_eq!(store.get(RegionId(1)).unwrap().tree, nested());
    }

    #[test]
    fn later_exit_overwrites_record() {
        let mut store = HistoryStore::default();
        store.record(&nested(), HistoryDepth::Deep);

        let replacement = ActiveTree {
            region: RegionId(1),
            vertex: VertexId(9),
            children: Vec::new(),
        };
        store.record(&replacement, HistoryDepth::Deep);

        assert_eq!(store.get(RegionId(1)).unwrap().tree.vertex, VertexId(9));
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn record_serializes() {
        let record = HistoryRecord::new(nested());
        let json = serde_json::to_string(&record).unwrap();
        let back: HistoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
