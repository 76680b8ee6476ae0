//! The run-to-completion step engine shared by every executor.
//!
//! An [`Engine`] owns one machine instance: its active configuration,
//! history, join bookkeeping and execution context. Executors wrap it in
//! their concurrency discipline and call [`Engine::go`], [`Engine::take`]
//! and the pause/resume family; the engine itself is single threaded.

mod configuration;
mod history;
mod join;
mod resolver;
mod scheduler;
mod step;

pub use configuration::{ActiveTree, DefaultEntryRule};
pub use history::HistoryRecord;
pub(crate) use scheduler::{Scheduler, TaskHandle};

use crate::checkpoint::{validate, Snapshot, SNAPSHOT_VERSION};
use crate::core::{BehaviorError, Event, ModelGraph, RegionId, TransitionId, VertexId};
use crate::error::EngineError;
use crate::executor::ExecutorConfig;
use crate::listener::{LifecycleEvent, Listener, Listeners, Phase};
use chrono::Utc;
use configuration::ActiveConfiguration;
use history::HistoryStore;
use join::JoinCoordinator;
use resolver::Stimulus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stillwater::validation::Validation;
use uuid::Uuid;

/// Lifecycle of a machine instance. Pausing is a separate flag that only
/// applies while `Started`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    NotStarted,
    Started,
    Terminated,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::NotStarted => "not started",
            Status::Started => "started",
            Status::Terminated => "terminated",
        })
    }
}

/// Work item for an engine: a user event or something the pool scheduled.
#[derive(Clone, Debug)]
pub(crate) enum Signal {
    Event(Event),
    Timer { token: u64 },
    ActivityEnded { state: VertexId, result: Result<(), BehaviorError> },
}

pub(crate) struct Engine<C> {
    model: Arc<ModelGraph<C>>,
    context: C,
    instance_id: Uuid,
    auto_start: bool,
    rule: DefaultEntryRule,
    status: Status,
    paused: bool,
    config: ActiveConfiguration,
    history: HistoryStore,
    joins: JoinCoordinator,
    listeners: Listeners,
    completions: VecDeque<VertexId>,
    terminate_pending: bool,
    scheduler: Option<Arc<dyn Scheduler>>,
    timers: HashMap<u64, (VertexId, TransitionId)>,
    next_timer: u64,
    deferred_timers: Vec<u64>,
    generation: u64,
}

impl<C: Clone> Engine<C> {
    pub(crate) fn new(model: Arc<ModelGraph<C>>, context: C, settings: &ExecutorConfig) -> Self {
        Self {
            model,
            context,
            instance_id: Uuid::new_v4(),
            auto_start: settings.auto_start,
            rule: settings.default_entry_rule,
            status: Status::NotStarted,
            paused: false,
            config: ActiveConfiguration::default(),
            history: HistoryStore::default(),
            joins: JoinCoordinator::default(),
            listeners: Listeners::default(),
            completions: VecDeque::new(),
            terminate_pending: false,
            scheduler: None,
            timers: HashMap::new(),
            next_timer: 0,
            deferred_timers: Vec::new(),
            generation: 0,
        }
    }

    pub(crate) fn set_scheduler(&mut self, scheduler: Arc<dyn Scheduler>) {
        self.scheduler = Some(scheduler);
    }

    pub(crate) fn model(&self) -> &Arc<ModelGraph<C>> {
        &self.model
    }

    pub(crate) fn context(&self) -> &C {
        &self.context
    }

    pub(crate) fn set_context(&mut self, context: C) {
        self.context = context;
    }

    /// Swap the model; the instance goes back to `NotStarted`.
    pub(crate) fn set_model(&mut self, model: Arc<ModelGraph<C>>) {
        self.clear_runtime();
        self.history.clear();
        self.status = Status::NotStarted;
        self.paused = false;
        self.model = model;
    }

    pub(crate) fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of pauses so far. Events queued under an older generation
    /// were submitted before a pause and must not run.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub(crate) fn add_listener(&mut self, listener: Arc<dyn Listener>) {
        self.listeners.add(listener);
    }

    pub(crate) fn is_active(&self, name: &str) -> bool {
        self.model
            .find(name)
            .is_some_and(|id| self.config.is_active(id))
    }

    /// Names of the active vertices, parents before children.
    pub(crate) fn active_states(&self) -> Vec<String> {
        self.config
            .forest(&self.model, self.model.root_regions())
            .iter()
            .flat_map(ActiveTree::vertices)
            .map(|id| self.model.name_of(id).to_string())
            .collect()
    }

    fn notify(&self, event: LifecycleEvent) {
        self.listeners.notify(&event);
    }

    /// Enter the root regions and run to a stable configuration.
    ///
    /// Without auto-start the machine may only be started by its first
    /// event.
    pub(crate) fn go(&mut self) -> Result<(), EngineError> {
        if self.status != Status::NotStarted {
            return Err(EngineError::illegal("go", self.status));
        }
        if !self.auto_start {
            return Err(EngineError::illegal("go before the first event", self.status));
        }
        self.launch()
    }

    fn launch(&mut self) -> Result<(), EngineError> {
        let machine = self.model.id().to_string();
        tracing::debug!(%machine, instance = %self.instance_id, "starting machine");
        self.status = Status::Started;
        self.notify(LifecycleEvent::MachineStarted { machine });

        if let Err(error) = self.start() {
            tracing::warn!(machine = self.model.id(), %error, "start failed; instance reset");
            self.clear_runtime();
            self.status = Status::NotStarted;
            return Err(error);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), EngineError> {
        let event = Event::start();
        let roots = self.model.root_regions().to_vec();
        for region in roots {
            if self.config.active_child(region).is_none() {
                self.enter_default(region, &event)?;
            }
        }
        self.settle(&event)?;
        self.drain_completions()
    }

    /// Submit an event. Returns whether a transition fired.
    pub(crate) fn take(&mut self, event: Event) -> Result<bool, EngineError> {
        if self.status == Status::NotStarted {
            tracing::debug!(machine = self.model.id(), %event, "first event starts the machine");
            self.launch()?;
        }
        if self.status == Status::Terminated {
            tracing::debug!(machine = self.model.id(), %event, "machine terminated; event denied");
            self.notify(LifecycleEvent::EventDenied { event });
            return Ok(false);
        }
        if self.paused {
            tracing::warn!(machine = self.model.id(), %event, "machine paused; event dropped");
            return Ok(false);
        }
        self.dispatch(Stimulus::Event(&event), &event)
    }

    /// Process a queued signal (pool-backed executor).
    pub(crate) fn process(&mut self, signal: Signal) -> Result<bool, EngineError> {
        match signal {
            Signal::Event(event) => self.take(event),
            Signal::Timer { token } => {
                if self.status != Status::Started {
                    self.timers.remove(&token);
                    return Ok(false);
                }
                if self.paused {
                    if self.timers.contains_key(&token) {
                        tracing::debug!(machine = self.model.id(), token, "time event deferred until resume");
                        self.deferred_timers.push(token);
                    }
                    return Ok(false);
                }
                let event = Event::timeout();
                let selection = self.select(&Stimulus::Timer(token));
                self.timers.remove(&token);
                match selection {
                    Some(selection) => {
                        self.notify(LifecycleEvent::EventAccepted {
                            event: event.clone(),
                        });
                        self.run_to_completion(selection, &event)?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            Signal::ActivityEnded { state, result } => {
                if let Some(vertex) = self.model.get_vertex(state) {
                    let phase = match result {
                        Ok(()) => Phase::After,
                        Err(error) => {
                            tracing::warn!(state = vertex.name(), %error, "activity failed");
                            Phase::Exception(error)
                        }
                    };
                    self.notify(LifecycleEvent::Activity {
                        state: vertex.name().to_string(),
                        phase,
                    });
                }
                Ok(false)
            }
        }
    }

    fn dispatch(&mut self, stimulus: Stimulus<'_>, event: &Event) -> Result<bool, EngineError> {
        match self.select(&stimulus) {
            Some(selection) => {
                tracing::debug!(machine = self.model.id(), %event, "event accepted");
                self.notify(LifecycleEvent::EventAccepted {
                    event: event.clone(),
                });
                self.run_to_completion(selection, event)?;
                Ok(true)
            }
            None => {
                tracing::debug!(machine = self.model.id(), %event, "no enabled transition; event denied");
                self.notify(LifecycleEvent::EventDenied {
                    event: event.clone(),
                });
                Ok(false)
            }
        }
    }

    fn drain_completions(&mut self) -> Result<(), EngineError> {
        while let Some(state) = self.completions.pop_front() {
            if self.terminate_pending {
                break;
            }
            if !self.config.is_active(state) {
                continue;
            }
            if let Some(selection) = self.select(&Stimulus::Completion(state)) {
                self.fire(selection, &Event::completion())?;
            }
        }
        if self.terminate_pending {
            self.terminate();
        }
        Ok(())
    }

    fn terminate(&mut self) {
        self.clear_runtime();
        self.status = Status::Terminated;
        let machine = self.model.id().to_string();
        tracing::debug!(%machine, instance = %self.instance_id, "machine terminated");
        self.notify(LifecycleEvent::MachineTerminated { machine });
    }

    pub(crate) fn pause(&mut self) -> Result<Snapshot<C>, EngineError> {
        if self.status != Status::Started || self.paused {
            return Err(EngineError::illegal("pause", self.status));
        }
        self.paused = true;
        self.generation += 1;
        tracing::debug!(machine = self.model.id(), "machine paused");
        self.notify(LifecycleEvent::Paused {
            machine: self.model.id().to_string(),
        });
        Ok(self.snapshot())
    }

    pub(crate) fn resume(&mut self, snapshot: Option<Snapshot<C>>) -> Result<(), EngineError> {
        if !self.paused {
            return Err(EngineError::illegal("resume", self.status));
        }
        if let Some(snapshot) = snapshot {
            self.apply(snapshot)?;
        }
        self.paused = false;
        self.rearm_deferred_timers();
        tracing::debug!(machine = self.model.id(), "machine resumed");
        self.notify(LifecycleEvent::Resumed {
            machine: self.model.id().to_string(),
        });
        Ok(())
    }

    /// Adopt a snapshot without resuming; legal before start or while paused.
    pub(crate) fn restore(&mut self, snapshot: Snapshot<C>) -> Result<(), EngineError> {
        if self.status != Status::NotStarted && !self.paused {
            return Err(EngineError::illegal("restore", self.status));
        }
        self.apply(snapshot)
    }

    /// Time events that came due while paused fire right after resume.
    fn rearm_deferred_timers(&mut self) {
        let Some(scheduler) = self.scheduler.clone() else {
            self.deferred_timers.clear();
            return;
        };
        for token in std::mem::take(&mut self.deferred_timers) {
            if let Some((state, _)) = self.timers.get(&token).copied() {
                let handle = scheduler.schedule_timer(Duration::ZERO, token);
                self.config.attach_task(state, handle);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Snapshot<C> {
        let state_configuration = (self.status == Status::Started)
            .then(|| self.config.forest(&self.model, self.model.root_regions()));
        Snapshot {
            version: SNAPSHOT_VERSION,
            state_machine_id: self.model.id().to_string(),
            instance_id: self.instance_id,
            taken_at: Utc::now(),
            context: self.context.clone(),
            history: self.history.records().clone(),
            state_configuration,
            unresolved: self.config.unresolved().clone(),
            join_arrivals: self.joins.arrivals().clone(),
            is_started: self.status != Status::NotStarted,
            is_terminated: self.status == Status::Terminated,
        }
    }

    fn apply(&mut self, snapshot: Snapshot<C>) -> Result<(), EngineError> {
        if let Validation::Failure(violations) = validate(&self.model, &snapshot) {
            let violations: Vec<_> = violations.iter().cloned().collect();
            tracing::warn!(count = violations.len(), "snapshot rejected");
            return Err(EngineError::InvalidSnapshot { violations });
        }

        self.clear_runtime();
        let trees = snapshot.state_configuration.unwrap_or_default();
        self.config.load(&trees, &snapshot.unresolved);
        self.history.replace(snapshot.history);
        let completed = self.completed_regions(&trees);
        self.joins.restore(snapshot.join_arrivals, completed);
        self.context = snapshot.context;
        self.status = if snapshot.is_terminated {
            Status::Terminated
        } else if snapshot.is_started {
            Status::Started
        } else {
            Status::NotStarted
        };

        if self.status == Status::Started {
            for id in trees.iter().flat_map(ActiveTree::vertices) {
                self.start_tasks(id);
            }
        }
        tracing::debug!(
            machine = self.model.id(),
            from = %snapshot.instance_id,
            status = %self.status,
            "snapshot applied"
        );
        Ok(())
    }

    /// Regions whose active child is a final state, grouped by owner.
    fn completed_regions(&self, trees: &[ActiveTree]) -> BTreeMap<VertexId, BTreeSet<RegionId>> {
        let mut completed: BTreeMap<VertexId, BTreeSet<RegionId>> = BTreeMap::new();
        let mut stack: Vec<&ActiveTree> = trees.iter().collect();
        while let Some(tree) = stack.pop() {
            if self.model.vertex(tree.vertex).is_final() {
                if let Some(owner) = self.model.region_owner(tree.region) {
                    completed.entry(owner).or_default().insert(tree.region);
                }
            }
            stack.extend(tree.children.iter());
        }
        completed
    }
}

impl<C> Engine<C> {
    /// Drop configuration, queued completions and background work.
    fn clear_runtime(&mut self) {
        self.config.reset();
        self.joins.clear();
        self.timers.clear();
        self.deferred_timers.clear();
        self.completions.clear();
        self.terminate_pending = false;
    }

    /// Abort background work when the owning executor goes away.
    pub(crate) fn shutdown(&mut self) {
        self.clear_runtime();
    }
}

impl<C> fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("machine", &self.model.id())
            .field("instance_id", &self.instance_id)
            .field("status", &self.status)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}
