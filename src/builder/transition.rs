//! Builder for transitions.

use crate::core::{Behavior, BehaviorError, BehaviorOutput, Event, Guard, TransitionKind, Trigger};
use std::time::Duration;

/// Unresolved transition: endpoints are still names.
pub(crate) struct TransitionDef<C> {
    pub(crate) name: Option<String>,
    pub(crate) source: String,
    pub(crate) target: String,
    pub(crate) kind: TransitionKind,
    pub(crate) triggers: Vec<Trigger>,
    pub(crate) guard: Option<Guard<C>>,
    pub(crate) effect: Option<Behavior<C>>,
}

impl<C> TransitionDef<C> {
    pub(crate) fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{} -> {}", self.source, self.target))
    }
}

/// Fluent configuration of one transition.
///
/// Handed to the closure of [`RegionBuilder::transition`](super::RegionBuilder::transition).
pub struct TransitionBuilder<C> {
    def: TransitionDef<C>,
}

impl<C> TransitionBuilder<C> {
    pub(crate) fn new(source: String, target: String) -> Self {
        Self {
            def: TransitionDef {
                name: None,
                source,
                target,
                kind: TransitionKind::External,
                triggers: Vec::new(),
                guard: None,
                effect: None,
            },
        }
    }

    /// Name the transition (used in logs and notifications).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.def.name = Some(name.into());
        self
    }

    /// Fire on an event with this name. May be called repeatedly.
    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.def.triggers.push(Trigger::Event(event.into()));
        self
    }

    /// Fire once the source state has been active for `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.def.triggers.push(Trigger::After(delay));
        self
    }

    pub fn guard(mut self, guard: Guard<C>) -> Self {
        self.def.guard = Some(guard);
        self
    }

    /// Guard with a closure.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> bool + Send + Sync + 'static,
    {
        self.def.guard = Some(Guard::new(predicate));
        self
    }

    /// Guard with a closure that may fail; failures count as `false`.
    pub fn when_fallible<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> Result<bool, BehaviorError> + Send + Sync + 'static,
    {
        self.def.guard = Some(Guard::fallible(predicate));
        self
    }

    /// Mark as the `else` branch.
    pub fn otherwise(mut self) -> Self {
        self.def.guard = Some(Guard::otherwise());
        self
    }

    pub fn effect<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut C, &Event) -> R + Send + Sync + 'static,
        R: BehaviorOutput,
    {
        self.def.effect = Some(Behavior::new(f));
        self
    }

    pub fn kind(mut self, kind: TransitionKind) -> Self {
        self.def.kind = kind;
        self
    }

    pub fn local(self) -> Self {
        self.kind(TransitionKind::Local)
    }

    pub fn internal(self) -> Self {
        self.kind(TransitionKind::Internal)
    }

    pub(crate) fn finish(self) -> TransitionDef<C> {
        self.def
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_triggers_in_order() {
        let def = TransitionBuilder::<()>::new("A".into(), "B".into())
            .on("x")
            .after(Duration::from_secs(1))
            .finish();

        assert_eq!(
            def.triggers,
            vec![
                Trigger::Event("x".into()),
                Trigger::After(Duration::from_secs(1))
            ]
        );
    }

    #[test]
    fn builder_defaults_to_external() {
        let def = TransitionBuilder::<()>::new("A".into(), "B".into()).finish();
        assert_eq!(def.kind, TransitionKind::External);
        assert!(def.guard.is_none());
        assert_eq!(def.label(), "A -> B");
    }

    #[test]
    fn otherwise_sets_else_guard() {
        let def = TransitionBuilder::<()>::new("A".into(), "B".into())
            .otherwise()
            .named("fallback")
            .finish();
        assert!(def.guard.unwrap().is_else());
        assert_eq!(def.name.as_deref(), Some("fallback"));
    }

    #[test]
    fn local_and_internal_shorthands() {
        let local = TransitionBuilder::<()>::new("A".into(), "B".into()).local().finish();
        let internal = TransitionBuilder::<()>::new("A".into(), "A".into())
            .internal()
            .finish();
        assert_eq!(local.kind, TransitionKind::Local);
        assert_eq!(internal.kind, TransitionKind::Internal);
    }
}
