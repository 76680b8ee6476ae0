//! The model graph: states, pseudostates, regions and transitions.
//!
//! Everything here is immutable once built. A [`ModelGraph`] is shared
//! read-only by every instance executing it; runtime state lives in the
//! engine, never in the model.

mod behavior;
mod event;
mod graph;
mod guard;
mod ids;
mod region;
mod transition;
mod vertex;

pub use behavior::{Activity, ActivityContext, ActivityFuture, Behavior, BehaviorError, BehaviorOutput};
pub(crate) use behavior::EventPoster;
pub use event::{Event, COMPLETION_EVENT, START_EVENT, TIMEOUT_EVENT};
pub(crate) use graph::common_prefix;
pub use graph::ModelGraph;
pub use guard::Guard;
pub use ids::{RegionId, TransitionId, VertexId};
pub use region::{HistoryDepth, Region, RegionOwner};
pub use transition::{Transition, TransitionKind, Trigger};
pub use vertex::{PseudoKind, StateData, StateKind, Vertex, VertexKind};
