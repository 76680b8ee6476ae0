//! Regions of the model graph.

use super::ids::{RegionId, TransitionId, VertexId};

/// Who owns a region: the machine itself or a composite/orthogonal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionOwner {
    Machine,
    State(VertexId),
}

/// Ordered container of vertices and transitions.
#[derive(Clone, Debug)]
pub struct Region {
    pub(crate) id: RegionId,
    pub(crate) name: String,
    pub(crate) owner: RegionOwner,
    pub(crate) vertices: Vec<VertexId>,
    pub(crate) transitions: Vec<TransitionId>,
    pub(crate) initial: Option<VertexId>,
    pub(crate) shallow_history: Option<VertexId>,
    pub(crate) deep_history: Option<VertexId>,
}

impl Region {
    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> RegionOwner {
        self.owner
    }

    /// Owning state, `None` for top-level regions.
    pub fn owner_state(&self) -> Option<VertexId> {
        match self.owner {
            RegionOwner::Machine => None,
            RegionOwner::State(state) => Some(state),
        }
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn transitions(&self) -> &[TransitionId] {
        &self.transitions
    }

    pub fn initial(&self) -> Option<VertexId> {
        self.initial
    }

    pub fn shallow_history(&self) -> Option<VertexId> {
        self.shallow_history
    }

    pub fn deep_history(&self) -> Option<VertexId> {
        self.deep_history
    }

    /// Kind of history kept for this region. Deep wins when both exist.
    pub fn history_depth(&self) -> Option<HistoryDepth> {
        if self.deep_history.is_some() {
            Some(HistoryDepth::Deep)
        } else if self.shallow_history.is_some() {
            Some(HistoryDepth::Shallow)
        } else {
            None
        }
    }
}

/// How much of a region's configuration history remembers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryDepth {
    Shallow,
    Deep,
}
