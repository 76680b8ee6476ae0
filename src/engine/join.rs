//! Orthogonal region completion and join synchronization.

use crate::core::{RegionId, VertexId};
use std::collections::{BTreeMap, BTreeSet};

/// Tracks which regions of a state have reached a final state, and which
/// regions have arrived at each join.
///
/// Both sets are order independent: only membership matters, so regions
/// finishing in any order release the same transition exactly once.
#[derive(Clone, Debug, Default)]
pub(crate) struct JoinCoordinator {
    completed: BTreeMap<VertexId, BTreeSet<RegionId>>,
    arrivals: BTreeMap<VertexId, BTreeSet<RegionId>>,
}

impl JoinCoordinator {
    /// Mark `region` of `state` complete. Returns `true` the one time the
    /// last of `total` regions completes.
    pub(crate) fn region_completed(&mut self, state: VertexId, region: RegionId, total: usize) -> bool {
        let done = self.completed.entry(state).or_default();
        done.insert(region) && done.len() == total
    }

    /// Forget completion flags of a state being exited.
    pub(crate) fn reset(&mut self, state: VertexId) {
        self.completed.remove(&state);
    }

    /// Record the arrival of `region` at `join`. Returns `true` once every
    /// region in `expected` has arrived, clearing the join for reuse.
    pub(crate) fn arrive(&mut self, join: VertexId, region: RegionId, expected: &BTreeSet<RegionId>) -> bool {
        let arrived = self.arrivals.entry(join).or_default();
        arrived.insert(region);
        if expected.is_subset(arrived) {
            self.arrivals.remove(&join);
            true
        } else {
            false
        }
    }

    /// True when `region` is parked at a join waiting for its siblings.
    pub(crate) fn is_parked(&self, region: RegionId) -> bool {
        self.arrivals.values().any(|regions| regions.contains(&region))
    }

    /// Drop arrivals from regions that are being exited.
    pub(crate) fn forget_regions(&mut self, regions: &[RegionId]) {
        for arrived in self.arrivals.values_mut() {
            for region in regions {
                arrived.remove(region);
            }
        }
        self.arrivals.retain(|_, arrived| !arrived.is_empty());
    }

    pub(crate) fn arrivals(&self) -> &BTreeMap<VertexId, BTreeSet<RegionId>> {
        &self.arrivals
    }

    pub(crate) fn restore(
        &mut self,
        arrivals: BTreeMap<VertexId, BTreeSet<RegionId>>,
        completed: BTreeMap<VertexId, BTreeSet<RegionId>>,
    ) {
        self.arrivals = arrivals;
        self.completed = completed;
    }

    pub(crate) fn clear(&mut self) {
        self.arrivals.clear();
        self.completed.clear();
    }
}
