//! Compound transition execution: exit, effect, entry, continuation.
//!
//! A selected transition is executed segment by segment. Each segment exits
//! below the boundary shared by its source and target chains, runs its
//! effect, enters down to its target and then continues at the target when
//! that is a pseudostate. Regions left empty along the way are filled by a
//! final default-entry pass.

use super::resolver::Selection;
use super::{Engine, Status};
use crate::core::{
    common_prefix, ActivityContext, Event, PseudoKind, RegionId, TransitionId, TransitionKind,
    VertexId, VertexKind,
};
use crate::error::EngineError;
use crate::listener::{LifecycleEvent, Phase};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

/// Explicit part of an entry: the states that must be entered and the
/// targets the entry is heading for.
struct EntryPlan {
    explicit: Vec<VertexId>,
    targets: Vec<VertexId>,
}

impl EntryPlan {
    fn new(explicit: Vec<VertexId>, targets: Vec<VertexId>) -> Self {
        Self { explicit, targets }
    }
}

impl<C: Clone> Engine<C> {
    /// Fire a selection and every completion transition it releases.
    pub(super) fn run_to_completion(&mut self, selection: Selection, event: &Event) -> Result<(), EngineError> {
        self.fire(selection, event)?;
        self.drain_completions()
    }

    pub(super) fn fire(&mut self, selection: Selection, event: &Event) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let label = model.transition(selection.transition).label();
        tracing::debug!(machine = model.id(), transition = %label, %event, "firing transition");
        self.notify(LifecycleEvent::TransitionStarted {
            transition: label.clone(),
        });

        let mut planned: VecDeque<TransitionId> = selection.junctions.into();
        self.run_segment(selection.transition, &mut planned, event)?;
        self.settle(event)?;

        self.notify(LifecycleEvent::TransitionEnded { transition: label });
        Ok(())
    }

    fn run_selection(&mut self, selection: Selection, event: &Event) -> Result<(), EngineError> {
        let mut planned: VecDeque<TransitionId> = selection.junctions.into();
        self.run_segment(selection.transition, &mut planned, event)
    }

    fn run_segment(
        &mut self,
        id: TransitionId,
        planned: &mut VecDeque<TransitionId>,
        event: &Event,
    ) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let transition = model.transition(id);
        let (source, target) = (transition.source(), transition.target());

        if transition.kind() == TransitionKind::Internal {
            self.run_effect(id, event);
            return Ok(());
        }
        if model.is_pseudo(target, PseudoKind::Join) {
            return self.arrive_at_join(id, event);
        }

        let source_chain = model.state_chain(source);
        let target_chain = model.state_chain(target);
        let mut boundary = common_prefix(&source_chain, &target_chain);

        if transition.kind() == TransitionKind::Local && model.vertex(source).is_state() {
            if source == target {
                return self.local_self(source, id, event);
            }
            if boundary == source_chain.len() {
                if let Some(region) = model.region_containing(source, target) {
                    self.exit_region(region, event);
                }
                self.run_effect(id, event);
                return self.enter_targets(&[target], planned, event);
            }
        }

        if model.vertex(source).is_configurable() {
            boundary = boundary.min(source_chain.len() - 1);
        }
        if model.vertex(target).is_configurable() {
            boundary = boundary.min(target_chain.len() - 1);
        }
        // The boundary must be a region: crossing between regions of one
        // orthogonal state leaves and re-enters that state.
        let source_region = self.region_below(&source_chain, source, boundary);
        let target_region = self.region_below(&target_chain, target, boundary);
        if boundary > 0 && source_region.is_some() && target_region.is_some() && source_region != target_region {
            boundary -= 1;
        }
        if let Some(top) = source_chain.get(boundary) {
            self.exit_vertex(*top, event);
        }
        self.run_effect(id, event);
        self.enter_targets(&[target], planned, event)
    }

    /// Region holding the part of `vertex`'s chain that lies below the
    /// first `boundary` states.
    fn region_below(&self, chain: &[VertexId], vertex: VertexId, boundary: usize) -> Option<RegionId> {
        match chain.get(boundary) {
            Some(state) => self.model.vertex(*state).container(),
            None => self.model.vertex(vertex).container(),
        }
    }

    /// Local self-transition: the state stays, its content is replaced.
    fn local_self(&mut self, state: VertexId, id: TransitionId, event: &Event) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let regions = model.vertex(state).regions();
        for region in regions {
            self.exit_region(*region, event);
        }
        self.run_effect(id, event);
        for region in regions {
            self.enter_default(*region, event)?;
        }
        Ok(())
    }

    fn enter_targets(
        &mut self,
        targets: &[VertexId],
        planned: &mut VecDeque<TransitionId>,
        event: &Event,
    ) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let mut explicit = Vec::new();
        for target in targets {
            for state in model.state_chain(*target) {
                if !explicit.contains(&state) {
                    explicit.push(state);
                }
            }
        }
        let plan = EntryPlan::new(explicit, targets.to_vec());

        for target in targets {
            let chain = model.state_chain(*target);
            if let Some(first) = chain.iter().copied().find(|v| !self.config.is_active(*v)) {
                self.enter_vertex(first, &plan, event)?;
            }
        }
        for target in targets {
            self.continue_at(*target, planned, event)?;
        }
        Ok(())
    }

    fn enter_vertex(&mut self, id: VertexId, plan: &EntryPlan, event: &Event) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let vertex = model.vertex(id);
        let Some(region) = vertex.container() else {
            return Ok(());
        };

        if let Some(current) = self.config.active_child(region) {
            if current != id {
                self.exit_vertex(current, event);
            }
        }
        let newly_entered = !self.config.is_active(id);
        if newly_entered {
            self.config.set_active(region, id);
            self.run_state_behaviors(id, true, event);
            self.start_tasks(id);
        }

        match vertex.kind() {
            VertexKind::Final if newly_entered => self.final_reached(region),
            VertexKind::State(data) if data.regions().is_empty() => {
                if newly_entered {
                    self.completions.push_back(id);
                }
            }
            VertexKind::State(data) => {
                let via_connection_point = plan
                    .targets
                    .iter()
                    .any(|t| model.vertex(*t).owner() == Some(id));
                for child_region in data.regions() {
                    let explicit = plan
                        .explicit
                        .iter()
                        .copied()
                        .find(|c| model.vertex(*c).container() == Some(*child_region));
                    if let Some(child) = explicit {
                        self.enter_vertex(child, plan, event)?;
                        continue;
                    }
                    let pending = plan
                        .targets
                        .iter()
                        .any(|t| model.vertex(*t).container() == Some(*child_region));
                    if via_connection_point
                        || pending
                        || self.config.active_child(*child_region).is_some()
                    {
                        continue;
                    }
                    self.enter_default(*child_region, event)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Continue a compound transition at a pseudostate target.
    fn continue_at(
        &mut self,
        target: VertexId,
        planned: &mut VecDeque<TransitionId>,
        event: &Event,
    ) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let vertex = model.vertex(target);
        match vertex.kind() {
            VertexKind::Pseudo(PseudoKind::Initial) => {
                match (self.select_at(target, |_| true, event), vertex.container()) {
                    (Some(selection), _) => self.run_selection(selection, event),
                    (None, Some(region)) => Err(EngineError::DefaultEntry {
                        region,
                        name: model.region(region).name().to_string(),
                    }),
                    (None, None) => Ok(()),
                }
            }
            VertexKind::Pseudo(PseudoKind::Junction) => match planned.pop_front() {
                Some(next) => self.run_segment(next, planned, event),
                None => self.choose(target, event),
            },
            VertexKind::Pseudo(PseudoKind::Choice) => self.choose(target, event),
            VertexKind::Pseudo(PseudoKind::Fork) => self.run_fork(target, event),
            VertexKind::Pseudo(PseudoKind::ShallowHistory | PseudoKind::DeepHistory) => {
                self.restore_history(target, event)
            }
            VertexKind::Pseudo(PseudoKind::EntryPoint) => {
                let outgoing = vertex.outgoing().to_vec();
                for id in outgoing {
                    if !self.guard_passes(id, event) {
                        continue;
                    }
                    let target = model.transition(id).target();
                    if let Some(junctions) = self.plan_junctions(target, event) {
                        let selection = Selection {
                            transition: id,
                            junctions,
                        };
                        self.run_selection(selection, event)?;
                    }
                }
                Ok(())
            }
            VertexKind::Pseudo(PseudoKind::ExitPoint) => {
                let selection = self.select_at(target, |_| true, event).or_else(|| {
                    model
                        .references_to(target)
                        .into_iter()
                        .find_map(|reference| self.select_at(reference, |_| true, event))
                });
                match selection {
                    Some(selection) => self.run_selection(selection, event),
                    None => Ok(()),
                }
            }
            VertexKind::ConnectionPointReference(points) => {
                for point in points {
                    self.continue_at(*point, planned, event)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Dynamic branch: guards are evaluated now, after earlier effects ran.
    fn choose(&mut self, vertex: VertexId, event: &Event) -> Result<(), EngineError> {
        match self.select_at(vertex, |_| true, event) {
            Some(selection) => self.run_selection(selection, event),
            None => Err(EngineError::DeadEnd {
                vertex,
                name: self.model.name_of(vertex).to_string(),
            }),
        }
    }

    /// All fork effects run first, then every target is entered in one pass.
    fn run_fork(&mut self, fork: VertexId, event: &Event) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let outgoing = model.vertex(fork).outgoing();
        for id in outgoing {
            self.run_effect(*id, event);
        }
        let targets: Vec<_> = outgoing
            .iter()
            .map(|id| model.transition(*id).target())
            .collect();
        self.enter_targets(&targets, &mut VecDeque::new(), event)
    }

    /// Exit one region's child into `join`; fire the join once every
    /// contributing region has arrived.
    fn arrive_at_join(&mut self, id: TransitionId, event: &Event) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let transition = model.transition(id);
        let (source, join) = (transition.source(), transition.target());
        let depth = model.state_chain(join).len();
        let source_chain = model.state_chain(source);

        let owner = source_chain.get(depth).copied();
        let region = owner.and_then(|o| model.region_containing(o, source));
        if let Some(region) = region {
            self.exit_region(region, event);
        }
        self.run_effect(id, event);

        if let (Some(owner), Some(region)) = (owner, region) {
            let expected: BTreeSet<RegionId> = model
                .vertex(join)
                .incoming()
                .iter()
                .filter_map(|t| model.region_containing(owner, model.transition(*t).source()))
                .collect();
            if !self.joins.arrive(join, region, &expected) {
                tracing::debug!(join = model.name_of(join), region = model.region(region).name(), "waiting at join");
                return Ok(());
            }
        }

        if let Some(owner) = owner {
            self.exit_vertex(owner, event);
        }
        self.choose(join, event)
    }

    fn restore_history(&mut self, pseudo: VertexId, event: &Event) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let Some(region) = model.vertex(pseudo).container() else {
            return Ok(());
        };
        if let Some(record) = self.history.get(region).cloned() {
            let explicit = record.tree.vertices();
            let first = record.tree.vertex;
            let plan = EntryPlan::new(explicit, Vec::new());
            return self.enter_vertex(first, &plan, event);
        }
        match self.select_at(pseudo, |_| true, event) {
            Some(selection) => self.run_selection(selection, event),
            None => self.enter_default(region, event),
        }
    }

    /// Enter a region without an explicit target.
    pub(super) fn enter_default(&mut self, region: RegionId, event: &Event) -> Result<(), EngineError> {
        let model = Arc::clone(&self.model);
        let r = model.region(region);
        if let Some(initial) = r.initial() {
            return self.continue_at(initial, &mut VecDeque::new(), event);
        }
        match self.rule {
            super::DefaultEntryRule::Initial => Err(EngineError::DefaultEntry {
                region,
                name: r.name().to_string(),
            }),
            super::DefaultEntryRule::None => {
                tracing::debug!(region = r.name(), "region entered unresolved");
                self.config.mark_unresolved(region);
                Ok(())
            }
        }
    }

    /// Default-enter every region of an active state that ended up empty.
    pub(super) fn settle(&mut self, event: &Event) -> Result<(), EngineError> {
        if self.terminate_pending || self.status != Status::Started {
            return Ok(());
        }
        let mut attempted = HashSet::new();
        loop {
            let empty: Vec<_> = self
                .empty_regions()
                .into_iter()
                .filter(|r| !attempted.contains(r))
                .collect();
            if empty.is_empty() {
                return Ok(());
            }
            for region in empty {
                attempted.insert(region);
                if self.config.active_child(region).is_none() {
                    self.enter_default(region, event)?;
                }
            }
        }
    }

    fn empty_regions(&self) -> Vec<RegionId> {
        let mut empty = Vec::new();
        let mut pending: Vec<RegionId> = self.model.root_regions().to_vec();
        while let Some(region) = pending.pop() {
            match self.config.active_child(region) {
                Some(child) => pending.extend(self.model.vertex(child).regions()),
                None if self.config.is_unresolved(region) || self.joins.is_parked(region) => {}
                None => empty.push(region),
            }
        }
        empty
    }

    fn exit_region(&mut self, region: RegionId, event: &Event) {
        let model = Arc::clone(&self.model);
        if let Some(depth) = model.region(region).history_depth() {
            if let Some(tree) = self.config.subtree(&model, region) {
                self.history.record(&tree, depth);
            }
        }
        if let Some(child) = self.config.active_child(region) {
            self.exit_vertex(child, event);
        }
        self.config.clear(region);
    }

    /// Exit a vertex and everything active below it, innermost first.
    fn exit_vertex(&mut self, id: VertexId, event: &Event) {
        if !self.config.is_active(id) {
            return;
        }
        let model = Arc::clone(&self.model);
        let vertex = model.vertex(id);
        let regions = vertex.regions();
        for region in regions {
            self.exit_region(*region, event);
        }
        if !regions.is_empty() {
            self.joins.forget_regions(regions);
            self.joins.reset(id);
        }

        self.run_state_behaviors(id, false, event);
        self.config.cancel_tasks(id);
        self.timers.retain(|_, (state, _)| *state != id);
        if let Some(region) = vertex.container() {
            self.config.clear(region);
        }
    }

    fn final_reached(&mut self, region: RegionId) {
        let model = Arc::clone(&self.model);
        match model.region_owner(region) {
            Some(state) => {
                let total = model.vertex(state).regions().len();
                if self.joins.region_completed(state, region, total) {
                    self.completions.push_back(state);
                }
            }
            None => {
                let all_final = model.root_regions().iter().all(|r| {
                    self.config
                        .active_child(*r)
                        .is_some_and(|v| model.vertex(v).is_final())
                });
                if all_final {
                    self.terminate_pending = true;
                }
            }
        }
    }

    fn run_state_behaviors(&mut self, id: VertexId, entering: bool, event: &Event) {
        let model = Arc::clone(&self.model);
        let vertex = model.vertex(id);
        let state = vertex.name().to_string();
        let wrap = |phase: Phase| {
            if entering {
                LifecycleEvent::StateEntry {
                    state: state.clone(),
                    phase,
                }
            } else {
                LifecycleEvent::StateExit {
                    state: state.clone(),
                    phase,
                }
            }
        };

        self.notify(wrap(Phase::Before));
        if let Some(data) = vertex.state() {
            let behaviors = if entering { &data.entry } else { &data.exit };
            for behavior in behaviors {
                if let Err(error) = behavior.invoke(&mut self.context, event) {
                    tracing::warn!(%state, entering, %error, "state behavior failed");
                    self.notify(wrap(Phase::Exception(error)));
                }
            }
        }
        self.notify(wrap(Phase::After));
    }

    fn run_effect(&mut self, id: TransitionId, event: &Event) {
        let model = Arc::clone(&self.model);
        let transition = model.transition(id);
        let Some(effect) = transition.effect() else {
            return;
        };
        let label = transition.label();
        self.notify(LifecycleEvent::Effect {
            transition: label.clone(),
            phase: Phase::Before,
        });
        if let Err(error) = effect.invoke(&mut self.context, event) {
            tracing::warn!(transition = %label, %error, "effect failed");
            self.notify(LifecycleEvent::Effect {
                transition: label.clone(),
                phase: Phase::Exception(error),
            });
        }
        self.notify(LifecycleEvent::Effect {
            transition: label,
            phase: Phase::After,
        });
    }

    /// Launch activities and arm time events of a freshly entered state.
    pub(super) fn start_tasks(&mut self, id: VertexId) {
        let Some(scheduler) = self.scheduler.clone() else {
            return;
        };
        let model = Arc::clone(&self.model);
        let vertex = model.vertex(id);
        let Some(data) = vertex.state() else {
            return;
        };

        for activity in data.activities() {
            let context = ActivityContext::new(id, vertex.name().to_string(), scheduler.poster());
            let handle = scheduler.spawn_activity(activity, context);
            self.config.attach_task(id, handle);
            self.notify(LifecycleEvent::Activity {
                state: vertex.name().to_string(),
                phase: Phase::Before,
            });
        }
        for transition in vertex.outgoing() {
            for delay in model.transition(*transition).time_triggers() {
                let token = self.next_timer;
                self.next_timer += 1;
                self.timers.insert(token, (id, *transition));
                let handle = scheduler.schedule_timer(delay, token);
                self.config.attach_task(id, handle);
            }
        }
    }
}
