//! Transitions of the model graph.

use super::behavior::Behavior;
use super::event::Event;
use super::guard::Guard;
use super::ids::{RegionId, TransitionId, VertexId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How much of the source state a transition leaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Exits the source and enters the target, even when one contains the other.
    #[default]
    External,
    /// Does not exit the composite source when the target lies inside it.
    Local,
    /// Runs the effect in place; no exit, no entry.
    Internal,
}

/// What makes a transition fire.
#[derive(Clone, Debug, PartialEq)]
pub enum Trigger {
    /// An event with this name.
    Event(String),
    /// A time event, relative to the entry of the source state.
    After(Duration),
}

impl Trigger {
    pub fn is_time(&self) -> bool {
        matches!(self, Trigger::After(_))
    }
}

/// An edge of the model graph.
pub struct Transition<C> {
    pub(crate) id: TransitionId,
    pub(crate) name: Option<String>,
    pub(crate) source: VertexId,
    pub(crate) target: VertexId,
    pub(crate) kind: TransitionKind,
    pub(crate) triggers: Vec<Trigger>,
    pub(crate) guard: Option<Guard<C>>,
    pub(crate) effect: Option<Behavior<C>>,
    pub(crate) container: RegionId,
}

impl<C> Transition<C> {
    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn source(&self) -> VertexId {
        self.source
    }

    pub fn target(&self) -> VertexId {
        self.target
    }

    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn guard(&self) -> Option<&Guard<C>> {
        self.guard.as_ref()
    }

    pub fn effect(&self) -> Option<&Behavior<C>> {
        self.effect.as_ref()
    }

    pub fn container(&self) -> RegionId {
        self.container
    }

    /// Trigger-less transitions only fire on completion.
    pub fn is_completion(&self) -> bool {
        self.triggers.is_empty()
    }

    /// True when one of the event triggers names this event.
    pub fn is_triggered_by(&self, event: &Event) -> bool {
        self.triggers
            .iter()
            .any(|t| matches!(t, Trigger::Event(name) if name == event.name()))
    }

    /// Delays of the time triggers.
    pub fn time_triggers(&self) -> impl Iterator<Item = Duration> + '_ {
        self.triggers.iter().filter_map(|t| match t {
            Trigger::After(delay) => Some(*delay),
            Trigger::Event(_) => None,
        })
    }

    /// Label used in logs and listener notifications.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }
}
