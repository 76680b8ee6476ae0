//! Executor that serializes calls with a mutex.

use super::{reject_pool_models, Executor, ExecutorConfig};
use crate::checkpoint::Snapshot;
use crate::core::{Event, ModelGraph};
use crate::engine::{Engine, Status};
use crate::error::EngineError;
use crate::listener::Listener;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Thread-safe executor: each call holds the engine lock for its whole
/// duration, so steps from different threads never interleave.
///
/// All methods take `&self`; share it behind an [`Arc`].
#[derive(Debug)]
pub struct LockedExecutor<C> {
    engine: Mutex<Engine<C>>,
}

impl<C: Clone> LockedExecutor<C> {
    pub fn new(model: Arc<ModelGraph<C>>, context: C) -> Result<Self, EngineError> {
        Self::with_config(model, context, ExecutorConfig::default())
    }

    pub fn with_config(
        model: Arc<ModelGraph<C>>,
        context: C,
        config: ExecutorConfig,
    ) -> Result<Self, EngineError> {
        reject_pool_models(&model)?;
        Ok(Self {
            engine: Mutex::new(Engine::new(model, context, &config)),
        })
    }

    pub fn go(&self) -> Result<(), EngineError> {
        self.engine.lock().go()
    }

    pub fn take(&self, event: Event) -> Result<bool, EngineError> {
        self.engine.lock().take(event)
    }

    pub fn pause(&self) -> Result<Snapshot<C>, EngineError> {
        self.engine.lock().pause()
    }

    pub fn resume(&self, snapshot: Option<Snapshot<C>>) -> Result<(), EngineError> {
        self.engine.lock().resume(snapshot)
    }

    pub fn restore(&self, snapshot: Snapshot<C>) -> Result<(), EngineError> {
        self.engine.lock().restore(snapshot)
    }

    pub fn snapshot(&self) -> Snapshot<C> {
        self.engine.lock().snapshot()
    }

    pub fn set_context(&self, context: C) {
        self.engine.lock().set_context(context);
    }

    pub fn set_state_machine(&self, model: Arc<ModelGraph<C>>) -> Result<(), EngineError> {
        reject_pool_models(&model)?;
        self.engine.lock().set_model(model);
        Ok(())
    }

    /// Run `f` with the execution context while holding the lock.
    pub fn with_context<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(self.engine.lock().context())
    }

    pub fn context(&self) -> C {
        self.engine.lock().context().clone()
    }

    pub fn status(&self) -> Status {
        self.engine.lock().status()
    }

    pub fn is_paused(&self) -> bool {
        self.engine.lock().is_paused()
    }

    pub fn is_active(&self, state: &str) -> bool {
        self.engine.lock().is_active(state)
    }

    pub fn active_states(&self) -> Vec<String> {
        self.engine.lock().active_states()
    }

    pub fn instance_id(&self) -> Uuid {
        self.engine.lock().instance_id()
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.engine.lock().add_listener(listener);
    }
}

impl<C: Clone> Executor<C> for LockedExecutor<C> {
    fn go(&mut self) -> Result<(), EngineError> {
        self.engine.get_mut().go()
    }

    fn take(&mut self, event: Event) -> Result<bool, EngineError> {
        self.engine.get_mut().take(event)
    }

    fn pause(&mut self) -> Result<Snapshot<C>, EngineError> {
        self.engine.get_mut().pause()
    }

    fn resume(&mut self, snapshot: Option<Snapshot<C>>) -> Result<(), EngineError> {
        self.engine.get_mut().resume(snapshot)
    }

    fn restore(&mut self, snapshot: Snapshot<C>) -> Result<(), EngineError> {
        self.engine.get_mut().restore(snapshot)
    }

    fn snapshot(&self) -> Snapshot<C> {
        LockedExecutor::snapshot(self)
    }

    fn set_context(&mut self, context: C) {
        self.engine.get_mut().set_context(context);
    }

    fn set_state_machine(&mut self, model: Arc<ModelGraph<C>>) -> Result<(), EngineError> {
        LockedExecutor::set_state_machine(self, model)
    }

    fn context(&self) -> C {
        LockedExecutor::context(self)
    }

    fn status(&self) -> Status {
        LockedExecutor::status(self)
    }

    fn is_paused(&self) -> bool {
        LockedExecutor::is_paused(self)
    }

    fn is_active(&self, state: &str) -> bool {
        LockedExecutor::is_active(self, state)
    }

    fn active_states(&self) -> Vec<String> {
        LockedExecutor::active_states(self)
    }

    fn instance_id(&self) -> Uuid {
        LockedExecutor::instance_id(self)
    }

    fn add_listener(&mut self, listener: Arc<dyn Listener>) {
        self.engine.get_mut().add_listener(listener);
    }
}
