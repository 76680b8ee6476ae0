//! Transition selection.
//!
//! The search starts at the innermost active vertices and walks outward, so
//! an inner transition always shadows an outer one for the same event.
//! Within one vertex, transitions are tried in declaration order and an
//! `else` transition is only taken when no sibling is enabled. Junction
//! chains are resolved eagerly: a candidate whose junction chain dead-ends
//! is not enabled.

use super::Engine;
use crate::core::{Event, PseudoKind, Transition, TransitionId, VertexId};
use crate::listener::LifecycleEvent;

/// What the resolver is asked to match.
pub(crate) enum Stimulus<'a> {
    Event(&'a Event),
    /// Completion of a state: only its trigger-less transitions apply.
    Completion(VertexId),
    /// Expiry of the time event registered under this token.
    Timer(u64),
}

/// A fireable transition plus the junction segments that follow it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Selection {
    pub(crate) transition: TransitionId,
    pub(crate) junctions: Vec<TransitionId>,
}

impl<C: Clone> Engine<C> {
    pub(crate) fn select(&self, stimulus: &Stimulus<'_>) -> Option<Selection> {
        match stimulus {
            Stimulus::Event(event) => self.model.root_regions().iter().find_map(|region| {
                self.config
                    .active_child(*region)
                    .and_then(|vertex| self.search(vertex, event))
            }),
            Stimulus::Completion(state) => {
                self.select_at(*state, Transition::is_completion, &Event::completion())
            }
            Stimulus::Timer(token) => {
                let (state, transition) = *self.timers.get(token)?;
                if !self.config.is_active(state) {
                    return None;
                }
                let event = Event::timeout();
                if !self.guard_passes(transition, &event) {
                    return None;
                }
                let junctions = self.plan_junctions(self.model.transition(transition).target(), &event)?;
                Some(Selection {
                    transition,
                    junctions,
                })
            }
        }
    }

    /// Depth first: active descendants region by region, then the vertex.
    fn search(&self, vertex: VertexId, event: &Event) -> Option<Selection> {
        let model = &self.model;
        for region in model.vertex(vertex).regions() {
            if let Some(child) = self.config.active_child(*region) {
                if let Some(selection) = self.search(child, event) {
                    return Some(selection);
                }
            }
        }
        self.select_at(vertex, |t| t.is_triggered_by(event), event)
    }

    /// First enabled outgoing transition of `vertex` among those `matches`
    /// accepts, falling back to the `else` transition.
    pub(crate) fn select_at(
        &self,
        vertex: VertexId,
        matches: impl Fn(&Transition<C>) -> bool,
        event: &Event,
    ) -> Option<Selection> {
        let mut fallback = None;
        for id in self.model.vertex(vertex).outgoing() {
            let transition = self.model.transition(*id);
            if !matches(transition) {
                continue;
            }
            if transition.guard().is_some_and(|g| g.is_else()) {
                fallback.get_or_insert(*id);
                continue;
            }
            if !self.guard_passes(*id, event) {
                continue;
            }
            if let Some(junctions) = self.plan_junctions(transition.target(), event) {
                return Some(Selection {
                    transition: *id,
                    junctions,
                });
            }
        }
        let transition = fallback?;
        let junctions = self.plan_junctions(self.model.transition(transition).target(), event)?;
        Some(Selection {
            transition,
            junctions,
        })
    }

    /// Segments following `target` through junctions; `None` on a dead end.
    pub(super) fn plan_junctions(&self, target: VertexId, event: &Event) -> Option<Vec<TransitionId>> {
        if !self.model.is_pseudo(target, PseudoKind::Junction) {
            return Some(Vec::new());
        }
        let next = self.select_at(target, |_| true, event)?;
        let mut path = Vec::with_capacity(next.junctions.len() + 1);
        path.push(next.transition);
        path.extend(next.junctions);
        Some(path)
    }

    /// Evaluate a guard; failures count as `false`.
    pub(crate) fn guard_passes(&self, id: TransitionId, event: &Event) -> bool {
        let transition = self.model.transition(id);
        let Some(guard) = transition.guard() else {
            return true;
        };
        match guard.check(&self.context, event) {
            Ok(passed) => {
                self.notify(LifecycleEvent::GuardEvaluated {
                    transition: transition.label(),
                    passed,
                });
                passed
            }
            Err(error) => {
                tracing::warn!(transition = %transition.label(), %error, "guard failed; treated as false");
                self.notify(LifecycleEvent::GuardFailed {
                    transition: transition.label(),
                    error,
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;
    use crate::executor::ExecutorConfig;

    fn engine(model: std::sync::Arc<crate::core::ModelGraph<Vec<String>>>) -> Engine<Vec<String>> {
        let mut engine = Engine::new(model, Vec::new(), &ExecutorConfig::default());
        engine.go().unwrap();
        engine
    }

    #[test]
    fn inner_transition_shadows_outer() {
        let model = ModelBuilder::new("m")
            .initial("i")
            .state("Outer", |s| {
                s.region("r", |r| {
                    r.initial("ri")
                        .state("Inner", |s| s)
                        .transition("ri", "Inner", |t| t)
                        .transition("Inner", "Inner", |t| t.on("x").named("inner"))
                })
            })
            .transition("i", "Outer", |t| t)
            .transition("Outer", "Outer", |t| t.on("x").named("outer"))
            .build()
            .unwrap();
        let engine = engine(model.clone());

        let selection = engine.select(&Stimulus::Event(&Event::new("x"))).unwrap();
        assert_eq!(model.transition(selection.transition).name(), Some("inner"));
    }

    #[test]
    fn else_is_taken_only_when_siblings_fail() {
        let model = ModelBuilder::new("m")
            .initial("i")
            .state("A", |s| s)
            .state("B", |s| s)
            .state("C", |s| s)
            .transition("i", "A", |t| t)
            .transition("A", "B", |t| t.on("x").otherwise().named("else"))
            .transition("A", "C", |t| {
                t.on("x")
                    .when(|ctx: &Vec<String>, _e: &Event| ctx.is_empty())
                    .named("guarded")
            })
            .build()
            .unwrap();
        let mut engine = engine(model.clone());

        let event = Event::new("x");
        let selection = engine.select(&Stimulus::Event(&event)).unwrap();
        assert_eq!(model.transition(selection.transition).name(), Some("guarded"));

        engine.set_context(vec!["busy".to_string()]);
        let selection = engine.select(&Stimulus::Event(&event)).unwrap();
        assert_eq!(model.transition(selection.transition).name(), Some("else"));
    }

    #[test]
    fn dead_end_junction_disables_candidate() {
        let model = ModelBuilder::new("m")
            .initial("i")
            .state("A", |s| s)
            .state("B", |s| s)
            .junction("j")
            .transition("i", "A", |t| t)
            .transition("A", "j", |t| t.on("x"))
            .transition("j", "B", |t| t.when(|_: &Vec<String>, _e: &Event| false))
            .build()
            .unwrap();
        let engine = engine(model);

        assert!(engine.select(&Stimulus::Event(&Event::new("x"))).is_none());
    }

    #[test]
    fn junction_chain_is_planned_at_dispatch() {
        let model = ModelBuilder::new("m")
            .initial("i")
            .state("A", |s| s)
            .state("B", |s| s)
            .junction("j1")
            .junction("j2")
            .transition("i", "A", |t| t)
            .transition("A", "j1", |t| t.on("x"))
            .transition("j1", "j2", |t| t.named("hop"))
            .transition("j2", "B", |t| t.named("land"))
            .build()
            .unwrap();
        let engine = engine(model.clone());

        let selection = engine.select(&Stimulus::Event(&Event::new("x"))).unwrap();
        let names: Vec<_> = selection
            .junctions
            .iter()
            .map(|id| model.transition(*id).name().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["hop", "land"]);
    }

    #[test]
    fn failing_guard_counts_as_false() {
        let model = ModelBuilder::new("m")
            .initial("i")
            .state("A", |s| s)
            .state("B", |s| s)
            .transition("i", "A", |t| t)
            .transition("A", "B", |t| {
                t.on("x").when_fallible(|_: &Vec<String>, _e: &Event| {
                    Err(crate::core::BehaviorError::msg("unavailable"))
                })
            })
            .build()
            .unwrap();
        let engine = engine(model);

        assert!(engine.select(&Stimulus::Event(&Event::new("x"))).is_none());
    }
}
