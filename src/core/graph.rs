//! The frozen model graph and its structural queries.

use super::ids::{RegionId, TransitionId, VertexId};
use super::region::Region;
use super::transition::Transition;
use super::vertex::{PseudoKind, Vertex, VertexKind};
use std::collections::HashMap;

/// Immutable arena holding every region, vertex and transition of a machine.
///
/// Built once by [`ModelBuilder`](crate::builder::ModelBuilder) and shared
/// read-only (behind an `Arc`) by any number of executors.
pub struct ModelGraph<C> {
    pub(crate) id: String,
    pub(crate) regions: Vec<Region>,
    pub(crate) vertices: Vec<Vertex<C>>,
    pub(crate) transitions: Vec<Transition<C>>,
    pub(crate) root_regions: Vec<RegionId>,
    pub(crate) names: HashMap<String, VertexId>,
}

impl<C> ModelGraph<C> {
    /// Stable machine id; snapshots carry it to find their model.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root_regions(&self) -> &[RegionId] {
        &self.root_regions
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex<C> {
        &self.vertices[id.0]
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    pub fn transition(&self, id: TransitionId) -> &Transition<C> {
        &self.transitions[id.0]
    }

    pub fn get_vertex(&self, id: VertexId) -> Option<&Vertex<C>> {
        self.vertices.get(id.0)
    }

    pub fn get_region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.0)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<C>> {
        self.vertices.iter()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition<C>> {
        self.transitions.iter()
    }

    /// Look a vertex up by its (qualified) name.
    pub fn find(&self, name: &str) -> Option<VertexId> {
        self.names.get(name).copied()
    }

    pub fn find_region(&self, name: &str) -> Option<RegionId> {
        self.regions.iter().find(|r| r.name == name).map(|r| r.id)
    }

    pub fn name_of(&self, id: VertexId) -> &str {
        &self.vertex(id).name
    }

    /// True when the model needs the pool-backed executor: a state has an
    /// activity or a transition has a time trigger.
    pub fn requires_worker_pool(&self) -> bool {
        self.vertices
            .iter()
            .any(|v| v.state().is_some_and(|s| !s.activities.is_empty()))
            || self
                .transitions
                .iter()
                .any(|t| t.triggers.iter().any(|tr| tr.is_time()))
    }

    /// State owning the region, `None` at the top level.
    pub fn region_owner(&self, region: RegionId) -> Option<VertexId> {
        self.region(region).owner_state()
    }

    /// Nearest enclosing state of a vertex.
    ///
    /// Connection points and connection point references resolve to their
    /// owning state.
    pub fn parent_state(&self, id: VertexId) -> Option<VertexId> {
        let vertex = self.vertex(id);
        match vertex.container {
            Some(region) => self.region_owner(region),
            None => vertex.owner,
        }
    }

    /// States enclosing `id`, outermost first, followed by `id` itself when
    /// it is a state or final state.
    ///
    /// Connection points sit on the boundary of their owning state and are
    /// placed inside it: their chain ends with the owner.
    pub fn state_chain(&self, id: VertexId) -> Vec<VertexId> {
        let mut chain = Vec::new();
        if self.vertex(id).is_configurable() {
            chain.push(id);
        }
        let mut current = self.parent_state(id);
        while let Some(state) = current {
            chain.push(state);
            current = self.parent_state(state);
        }
        chain.reverse();
        chain
    }

    /// True when `ancestor` is `id` or encloses it.
    pub fn is_ancestor_or_self(&self, ancestor: VertexId, id: VertexId) -> bool {
        self.state_chain(id).contains(&ancestor)
    }

    /// History pseudostate of a region, deep preferred.
    pub fn history_of(&self, region: RegionId) -> Option<VertexId> {
        let r = self.region(region);
        r.deep_history.or(r.shallow_history)
    }

    /// Region of `state` whose subtree contains `id`.
    pub fn region_containing(&self, state: VertexId, id: VertexId) -> Option<RegionId> {
        let mut current = id;
        loop {
            let vertex = self.vertex(current);
            let region = vertex.container?;
            match self.region_owner(region) {
                Some(owner) if owner == state => return Some(region),
                Some(owner) => current = owner,
                None => return None,
            }
        }
    }

    /// Connection point references of a submachine state that point at `point`.
    pub fn references_to(&self, point: VertexId) -> Vec<VertexId> {
        let Some(owner) = self.vertex(point).owner else {
            return Vec::new();
        };
        let Some(state) = self.vertex(owner).state() else {
            return Vec::new();
        };
        state
            .connection_points
            .iter()
            .copied()
            .filter(|cp| match &self.vertex(*cp).kind {
                VertexKind::ConnectionPointReference(points) => points.contains(&point),
                _ => false,
            })
            .collect()
    }

    pub fn is_pseudo(&self, id: VertexId, kind: PseudoKind) -> bool {
        self.vertex(id).pseudo_kind() == Some(kind)
    }
}

impl<C> std::fmt::Debug for ModelGraph<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGraph")
            .field("id", &self.id)
            .field("regions", &self.regions.len())
            .field("vertices", &self.vertices.len())
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

/// Length of the common prefix of two state chains.
pub(crate) fn common_prefix(a: &[VertexId], b: &[VertexId]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
