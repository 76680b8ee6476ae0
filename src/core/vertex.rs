//! Vertices of the model graph.

use super::behavior::{Activity, Behavior};
use super::ids::{RegionId, TransitionId, VertexId};
use serde::{Deserialize, Serialize};

/// Kinds of pseudostate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PseudoKind {
    Initial,
    Junction,
    Choice,
    Fork,
    Join,
    ShallowHistory,
    DeepHistory,
    EntryPoint,
    ExitPoint,
}

impl PseudoKind {
    pub fn is_history(self) -> bool {
        matches!(self, PseudoKind::ShallowHistory | PseudoKind::DeepHistory)
    }

    /// Entry and exit points are owned by a state rather than a region.
    pub fn is_connection_point(self) -> bool {
        matches!(self, PseudoKind::EntryPoint | PseudoKind::ExitPoint)
    }
}

/// Structural classification of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    Simple,
    Composite,
    Orthogonal,
    Submachine,
}

/// Payload of a state vertex.
pub struct StateData<C> {
    pub(crate) regions: Vec<RegionId>,
    pub(crate) connection_points: Vec<VertexId>,
    pub(crate) entry: Vec<Behavior<C>>,
    pub(crate) exit: Vec<Behavior<C>>,
    pub(crate) activities: Vec<Activity>,
    pub(crate) submachine: Option<String>,
}

impl<C> StateData<C> {
    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    pub fn connection_points(&self) -> &[VertexId] {
        &self.connection_points
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    /// Id of the machine definition inlined under this state, if any.
    pub fn submachine(&self) -> Option<&str> {
        self.submachine.as_deref()
    }

    pub fn kind(&self) -> StateKind {
        if self.submachine.is_some() {
            StateKind::Submachine
        } else {
            match self.regions.len() {
                0 => StateKind::Simple,
                1 => StateKind::Composite,
                _ => StateKind::Orthogonal,
            }
        }
    }
}

/// The closed set of vertex variants.
pub enum VertexKind<C> {
    State(StateData<C>),
    Pseudo(PseudoKind),
    Final,
    /// Reference to entry/exit points of the submachine state owning it.
    ConnectionPointReference(Vec<VertexId>),
}

/// A node of the model graph.
pub struct Vertex<C> {
    pub(crate) id: VertexId,
    pub(crate) name: String,
    /// Region containing the vertex; `None` for connection points and
    /// connection point references, which hang off their owning state.
    pub(crate) container: Option<RegionId>,
    pub(crate) owner: Option<VertexId>,
    pub(crate) kind: VertexKind<C>,
    pub(crate) outgoing: Vec<TransitionId>,
    pub(crate) incoming: Vec<TransitionId>,
}

impl<C> Vertex<C> {
    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container(&self) -> Option<RegionId> {
        self.container
    }

    /// Owning state of a connection point or connection point reference.
    pub fn owner(&self) -> Option<VertexId> {
        self.owner
    }

    pub fn kind(&self) -> &VertexKind<C> {
        &self.kind
    }

    /// Outgoing transitions in declaration order.
    pub fn outgoing(&self) -> &[TransitionId] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[TransitionId] {
        &self.incoming
    }

    pub fn state(&self) -> Option<&StateData<C>> {
        match &self.kind {
            VertexKind::State(data) => Some(data),
            _ => None,
        }
    }

    pub fn pseudo_kind(&self) -> Option<PseudoKind> {
        match self.kind {
            VertexKind::Pseudo(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_state(&self) -> bool {
        matches!(self.kind, VertexKind::State(_))
    }

    pub fn is_final(&self) -> bool {
        matches!(self.kind, VertexKind::Final)
    }

    /// States and final states can be part of an active configuration.
    pub fn is_configurable(&self) -> bool {
        self.is_state() || self.is_final()
    }

    /// Regions of a state; empty for every other vertex kind.
    pub fn regions(&self) -> &[RegionId] {
        self.state().map(|s| s.regions()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(regions: usize, submachine: Option<&str>) -> StateData<()> {
        StateData {
            regions: (0..regions).map(RegionId).collect(),
            connection_points: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            activities: Vec::new(),
            submachine: submachine.map(str::to_string),
        }
    }

    #[test]
    fn state_kind_follows_region_count() {
        assert_eq!(state(0, None).kind(), StateKind::Simple);
        assert_eq!(state(1, None).kind(), StateKind::Composite);
        assert_eq!(state(3, None).kind(), StateKind::Orthogonal);
        assert_eq!(state(1, Some("inner")).kind(), StateKind::Submachine);
    }

    #[test]
    fn pseudo_kind_predicates() {
        assert!(PseudoKind::DeepHistory.is_history());
        assert!(!PseudoKind::Choice.is_history());
        assert!(PseudoKind::ExitPoint.is_connection_point());
        assert!(!PseudoKind::Fork.is_connection_point());
    }
}
