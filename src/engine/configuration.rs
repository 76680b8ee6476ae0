//! Active configuration tracking.

use super::scheduler::TaskHandle;
use crate::core::{ModelGraph, RegionId, VertexId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Policy for entering a region without an explicit inner target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultEntryRule {
    /// Follow the region's initial pseudostate; fail when there is none.
    #[default]
    Initial,
    /// Leave the region entered but unresolved until a transition targets
    /// a vertex inside it.
    None,
}

/// Serializable view of the vertex active in one region and, below it,
/// the vertices active in its own regions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTree {
    pub region: RegionId,
    pub vertex: VertexId,
    #[serde(default)]
    pub children: Vec<ActiveTree>,
}

impl ActiveTree {
    /// Drop everything below the immediate child.
    pub fn shallow(&self) -> Self {
        Self {
            region: self.region,
            vertex: self.vertex,
            children: Vec::new(),
        }
    }

    /// Vertices of the tree, parents before children.
    pub fn vertices(&self) -> Vec<VertexId> {
        let mut out = vec![self.vertex];
        for child in &self.children {
            out.extend(child.vertices());
        }
        out
    }
}

/// Which vertex is active in each region.
///
/// Keeps a reverse index so `is_active` does not need the model, and holds
/// the task handles (activities, time events) of active states so exiting a
/// state can cancel them.
#[derive(Debug, Default)]
pub(crate) struct ActiveConfiguration {
    by_region: BTreeMap<RegionId, VertexId>,
    by_vertex: HashMap<VertexId, RegionId>,
    unresolved: BTreeSet<RegionId>,
    tasks: HashMap<VertexId, Vec<TaskHandle>>,
}

impl ActiveConfiguration {
    pub(crate) fn is_active(&self, vertex: VertexId) -> bool {
        self.by_vertex.contains_key(&vertex)
    }

    pub(crate) fn active_child(&self, region: RegionId) -> Option<VertexId> {
        self.by_region.get(&region).copied()
    }

    pub(crate) fn set_active(&mut self, region: RegionId, vertex: VertexId) {
        if let Some(previous) = self.by_region.insert(region, vertex) {
            self.by_vertex.remove(&previous);
        }
        self.by_vertex.insert(vertex, region);
        self.unresolved.remove(&region);
    }

    pub(crate) fn clear(&mut self, region: RegionId) {
        if let Some(previous) = self.by_region.remove(&region) {
            self.by_vertex.remove(&previous);
        }
        self.unresolved.remove(&region);
    }

    pub(crate) fn mark_unresolved(&mut self, region: RegionId) {
        self.unresolved.insert(region);
    }

    pub(crate) fn is_unresolved(&self, region: RegionId) -> bool {
        self.unresolved.contains(&region)
    }

    pub(crate) fn unresolved(&self) -> &BTreeSet<RegionId> {
        &self.unresolved
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_region.is_empty() && self.unresolved.is_empty()
    }

    pub(crate) fn attach_task(&mut self, state: VertexId, handle: TaskHandle) {
        self.tasks.entry(state).or_default().push(handle);
    }

    /// Abort every task started on entry of `state`.
    pub(crate) fn cancel_tasks(&mut self, state: VertexId) {
        if let Some(handles) = self.tasks.remove(&state) {
            for handle in handles {
                handle.cancel();
            }
        }
    }

    /// Forget everything, aborting all tasks.
    pub(crate) fn reset(&mut self) {
        for (_, handles) in self.tasks.drain() {
            for handle in handles {
                handle.cancel();
            }
        }
        self.by_region.clear();
        self.by_vertex.clear();
        self.unresolved.clear();
    }

    /// Tree rooted at the active child of `region`.
    pub(crate) fn subtree<C>(&self, model: &ModelGraph<C>, region: RegionId) -> Option<ActiveTree> {
        let vertex = self.active_child(region)?;
        Some(ActiveTree {
            region,
            vertex,
            children: self.forest(model, model.vertex(vertex).regions()),
        })
    }

    /// Trees for each of `regions`, skipping empty ones.
    pub(crate) fn forest<C>(&self, model: &ModelGraph<C>, regions: &[RegionId]) -> Vec<ActiveTree> {
        regions
            .iter()
            .filter_map(|r| self.subtree(model, *r))
            .collect()
    }

    /// Rebuild the region map from a tree list. Tasks are not touched.
    pub(crate) fn load(&mut self, trees: &[ActiveTree], unresolved: &BTreeSet<RegionId>) {
        self.by_region.clear();
        self.by_vertex.clear();
        let mut stack: Vec<&ActiveTree> = trees.iter().collect();
        while let Some(tree) = stack.pop() {
            self.by_region.insert(tree.region, tree.vertex);
            self.by_vertex.insert(tree.vertex, tree.region);
            stack.extend(tree.children.iter());
        }
        self.unresolved = unresolved.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_active_replaces_previous_child() {
        let mut config = ActiveConfiguration::default();
        config.set_active(RegionId(0), VertexId(1));
        config.set_active(RegionId(0), VertexId(2));

        assert!(!config.is_active(VertexId(1)));
        assert!(config.is_active(VertexId(2)));
        assert_eq!(config.active_child(RegionId(0)), Some(VertexId(2)));
    }

    #[test]
    fn entering_a_region_resolves_it() {
        let mut config = ActiveConfiguration::default();
        config.mark_unresolved(RegionId(3));
        assert!(config.is_unresolved(RegionId(3)));

        config.set_active(RegionId(3), VertexId(4));
        assert!(!config.is_unresolved(RegionId(3)));
    }

    #[test]
    fn clear_empties_region() {
        let mut config = ActiveConfiguration::default();
        config.set_active(RegionId(0), VertexId(1));
        config.clear(RegionId(0));
        assert!(config.is_empty());
        assert_eq!(config.active_child(RegionId(0)), None);
    }

    #[test]
    fn load_restores_nested_trees() {
        let trees = vec![ActiveTree {
            region: RegionId(0),
            vertex: VertexId(1),
            children: vec![ActiveTree {
                region: RegionId(1),
                vertex: VertexId(2),
                children: Vec::new(),
            }],
        }];
        let mut config = ActiveConfiguration::default();
        config.load(&trees, &BTreeSet::new());

        assert!(config.is_active(VertexId(1)));
        assert!(config.is_active(VertexId(2)));
        assert_eq!(trees[0].vertices(), vec![VertexId(1), VertexId(2)]);
        assert!(trees[0].shallow().children.is_empty());
    }
}
