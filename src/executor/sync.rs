//! Executor that runs every step on the caller's thread.

use super::{reject_pool_models, Executor, ExecutorConfig};
use crate::checkpoint::Snapshot;
use crate::core::{Event, ModelGraph};
use crate::engine::{Engine, Status};
use crate::error::EngineError;
use crate::listener::Listener;
use std::sync::Arc;
use uuid::Uuid;

/// Single-threaded executor.
///
/// `take` returns once the whole run-to-completion step, including every
/// behavior it triggers, has finished.
///
/// # Example
///
/// ```
/// use statewise::{Event, Executor, ModelBuilder, SyncExecutor};
///
/// let model = ModelBuilder::new("door")
///     .initial("init")
///     .state("Closed", |s| s)
///     .state("Open", |s| s)
///     .transition("init", "Closed", |t| t)
///     .transition("Closed", "Open", |t| t.on("open"))
///     .build()
///     .unwrap();
///
/// let mut door = SyncExecutor::new(model, ()).unwrap();
/// door.go().unwrap();
/// assert!(door.take(Event::new("open")).unwrap());
/// assert!(door.is_active("Open"));
/// ```
#[derive(Debug)]
pub struct SyncExecutor<C> {
    engine: Engine<C>,
}

impl<C: Clone> SyncExecutor<C> {
    pub fn new(model: Arc<ModelGraph<C>>, context: C) -> Result<Self, EngineError> {
        Self::with_config(model, context, ExecutorConfig::default())
    }

    /// Fails with [`EngineError::RequiresWorkerPool`] when the model has
    /// activities or time events.
    pub fn with_config(
        model: Arc<ModelGraph<C>>,
        context: C,
        config: ExecutorConfig,
    ) -> Result<Self, EngineError> {
        reject_pool_models(&model)?;
        Ok(Self {
            engine: Engine::new(model, context, &config),
        })
    }

    /// Borrow the execution context without cloning it.
    pub fn context_ref(&self) -> &C {
        self.engine.context()
    }

    pub fn model(&self) -> &Arc<ModelGraph<C>> {
        self.engine.model()
    }
}

impl<C: Clone> Executor<C> for SyncExecutor<C> {
    fn go(&mut self) -> Result<(), EngineError> {
        self.engine.go()
    }

    fn take(&mut self, event: Event) -> Result<bool, EngineError> {
        self.engine.take(event)
    }

    fn pause(&mut self) -> Result<Snapshot<C>, EngineError> {
        self.engine.pause()
    }

    fn resume(&mut self, snapshot: Option<Snapshot<C>>) -> Result<(), EngineError> {
        self.engine.resume(snapshot)
    }

    fn restore(&mut self, snapshot: Snapshot<C>) -> Result<(), EngineError> {
        self.engine.restore(snapshot)
    }

    fn snapshot(&self) -> Snapshot<C> {
        self.engine.snapshot()
    }

    fn set_context(&mut self, context: C) {
        self.engine.set_context(context);
    }

    fn set_state_machine(&mut self, model: Arc<ModelGraph<C>>) -> Result<(), EngineError> {
        reject_pool_models(&model)?;
        self.engine.set_model(model);
        Ok(())
    }

    fn context(&self) -> C {
        self.engine.context().clone()
    }

    fn status(&self) -> Status {
        self.engine.status()
    }

    fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }

    fn is_active(&self, state: &str) -> bool {
        self.engine.is_active(state)
    }

    fn active_states(&self) -> Vec<String> {
        self.engine.active_states()
    }

    fn instance_id(&self) -> Uuid {
        self.engine.instance_id()
    }

    fn add_listener(&mut self, listener: Arc<dyn Listener>) {
        self.engine.add_listener(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;
    use crate::listener::{LifecycleEvent, RecordingListener};
    use std::time::Duration;

    fn toggle() -> Arc<ModelGraph<u32>> {
        ModelBuilder::new("toggle")
            .initial("i")
            .state("Off", |s| s)
            .state("On", |s| s.entry(|count: &mut u32, _e: &Event| *count += 1))
            .transition("i", "Off", |t| t)
            .transition("Off", "On", |t| t.on("flip"))
            .transition("On", "Off", |t| t.on("flip"))
            .build()
            .unwrap()
    }

    #[test]
    fn go_twice_is_illegal() {
        let mut executor = SyncExecutor::new(toggle(), 0).unwrap();
        executor.go().unwrap();
        assert_eq!(
            executor.go(),
            Err(EngineError::IllegalStart {
                operation: "go",
                status: Status::Started
            })
        );
    }

    #[test]
    fn take_auto_starts_by_default() {
        let mut executor = SyncExecutor::new(toggle(), 0).unwrap();
        assert!(executor.take(Event::new("flip")).unwrap());
        assert_eq!(executor.active_states(), vec!["On"]);
        assert_eq!(*executor.context_ref(), 1);
    }

    #[test]
    fn without_auto_start_only_the_first_event_starts_the_machine() {
        let config = ExecutorConfig::default().auto_start(false);
        let mut executor = SyncExecutor::with_config(toggle(), 0, config).unwrap();
        assert_eq!(
            executor.go(),
            Err(EngineError::IllegalStart {
                operation: "go before the first event",
                status: Status::NotStarted
            })
        );

        assert!(executor.take(Event::new("flip")).unwrap());
        assert_eq!(executor.status(), Status::Started);
        assert_eq!(executor.active_states(), vec!["On"]);
        assert!(matches!(
            executor.go(),
            Err(EngineError::IllegalStart { operation: "go", .. })
        ));
    }

    #[test]
    fn unmatched_event_is_denied() {
        let recorder = Arc::new(RecordingListener::new());
        let mut executor = SyncExecutor::new(toggle(), 0).unwrap();
        executor.add_listener(recorder.clone());
        executor.go().unwrap();

        assert!(!executor.take(Event::new("unknown")).unwrap());
        assert!(recorder
            .events()
            .iter()
            .any(|e| matches!(e, LifecycleEvent::EventDenied { event } if event.name() == "unknown")));
    }

    #[test]
    fn paused_machine_drops_events() {
        let mut executor = SyncExecutor::new(toggle(), 0).unwrap();
        executor.go().unwrap();
        executor.pause().unwrap();

        assert!(!executor.take(Event::new("flip")).unwrap());
        executor.resume(None).unwrap();
        assert!(executor.is_active("Off"));
        assert!(executor.take(Event::new("flip")).unwrap());
        assert!(executor.is_active("On"));
    }

    #[test]
    fn resume_without_pause_is_illegal() {
        let mut executor = SyncExecutor::new(toggle(), 0).unwrap();
        executor.go().unwrap();
        assert!(matches!(
            executor.resume(None),
            Err(EngineError::IllegalStart { operation: "resume", .. })
        ));
    }

    #[test]
    fn time_events_need_a_worker_pool() {
        let timed = ModelBuilder::new("timed")
            .initial("i")
            .state("Wait", |s| s)
            .state("Done", |s| s)
            .transition("i", "Wait", |t| t)
            .transition("Wait", "Done", |t| t.after(Duration::from_millis(5)))
            .build()
            .unwrap();

        assert_eq!(
            SyncExecutor::new(timed.clone(), 0).unwrap_err(),
            EngineError::RequiresWorkerPool {
                machine: "timed".to_string()
            }
        );

        let mut executor = SyncExecutor::new(toggle(), 0).unwrap();
        assert!(executor.set_state_machine(timed).is_err());
    }

    #[test]
    fn set_state_machine_resets_instance() {
        let mut executor = SyncExecutor::new(toggle(), 0).unwrap();
        executor.go().unwrap();
        executor.take(Event::new("flip")).unwrap();

        executor.set_state_machine(toggle()).unwrap();
        assert_eq!(executor.status(), Status::NotStarted);
        assert!(executor.active_states().is_empty());
        executor.go().unwrap();
        assert!(executor.is_active("Off"));
    }

    #[test]
    fn snapshot_never_mutates() {
        let mut executor = SyncExecutor::new(toggle(), 0).unwrap();
        executor.go().unwrap();
        let before = executor.snapshot();
        let again = executor.snapshot();
        assert_eq!(before.state_configuration, again.state_configuration);
        assert_eq!(executor.status(), Status::Started);
        assert!(!executor.is_paused());
    }
}
