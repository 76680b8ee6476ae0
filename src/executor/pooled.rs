//! Executor backed by a tokio runtime.
//!
//! Each instance owns an unbounded queue drained by a single consumer task,
//! so at most one step is in flight per instance while callers return
//! immediately. Activities and time events are spawned on the same runtime
//! and feed their results back through the queue.

use super::{Executor, ExecutorConfig};
use crate::checkpoint::Snapshot;
use crate::core::{Activity, ActivityContext, Event, EventPoster, ModelGraph};
use crate::engine::{Engine, Scheduler, Signal, Status, TaskHandle};
use crate::error::EngineError;
use crate::listener::Listener;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{error, warn};
use uuid::Uuid;

enum Command {
    Signal(Signal),
    /// Event taken by a caller, stamped with the engine's pause generation.
    Taken { event: Event, generation: u64 },
    Flush(oneshot::Sender<()>),
}

/// Background work for one instance. Holds only a weak sender so running
/// tasks never keep a dropped executor's queue alive.
struct TokioScheduler {
    runtime: Handle,
    queue: mpsc::WeakUnboundedSender<Command>,
}

impl TokioScheduler {
    fn send(queue: &mpsc::WeakUnboundedSender<Command>, signal: Signal) -> bool {
        queue
            .upgrade()
            .is_some_and(|sender| sender.send(Command::Signal(signal)).is_ok())
    }
}

impl Scheduler for TokioScheduler {
    fn spawn_activity(&self, activity: &Activity, context: ActivityContext) -> TaskHandle {
        let state = context.state();
        let queue = self.queue.clone();
        let running = activity.start(context);
        let task = self.runtime.spawn(async move {
            let result = running.await;
            Self::send(&queue, Signal::ActivityEnded { state, result });
        });
        TaskHandle::new(task.abort_handle())
    }

    fn schedule_timer(&self, delay: Duration, token: u64) -> TaskHandle {
        let queue = self.queue.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            Self::send(&queue, Signal::Timer { token });
        });
        TaskHandle::new(task.abort_handle())
    }

    fn poster(&self) -> EventPoster {
        let queue = self.queue.clone();
        Arc::new(move |event| Self::send(&queue, Signal::Event(event)))
    }
}

/// Asynchronous executor; required for models with activities or time
/// events.
///
/// `take` only enqueues. Use [`PooledExecutor::flush`] to wait until
/// everything submitted so far has been processed. Errors raised by queued
/// steps are logged and otherwise dropped.
///
/// # Example
///
/// ```
/// use statewise::{Event, ModelBuilder, PooledExecutor};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let model = ModelBuilder::new("kettle")
///     .initial("init")
///     .state("Heating", |s| s)
///     .state("Boiled", |s| s)
///     .transition("init", "Heating", |t| t)
///     .transition("Heating", "Boiled", |t| t.after(Duration::from_millis(10)))
///     .build()
///     .unwrap();
///
/// let kettle = PooledExecutor::new(model, ()).unwrap();
/// kettle.go().unwrap();
/// tokio::time::sleep(Duration::from_millis(50)).await;
/// kettle.flush().await.unwrap();
/// assert!(kettle.is_active("Boiled"));
/// # }
/// ```
pub struct PooledExecutor<C> {
    engine: Arc<Mutex<Engine<C>>>,
    queue: mpsc::UnboundedSender<Command>,
    consumer: AbortHandle,
}

impl<C: Clone + Send + 'static> PooledExecutor<C> {
    /// Use the runtime of the calling task.
    pub fn new(model: Arc<ModelGraph<C>>, context: C) -> Result<Self, EngineError> {
        Self::with_config(model, context, ExecutorConfig::default())
    }

    /// Fails with [`EngineError::NoWorkerPool`] when the config carries no
    /// runtime handle and the caller is not inside a tokio runtime.
    pub fn with_config(
        model: Arc<ModelGraph<C>>,
        context: C,
        config: ExecutorConfig,
    ) -> Result<Self, EngineError> {
        let runtime = config
            .worker_pool
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(EngineError::NoWorkerPool)?;

        let (queue, mut inbox) = mpsc::unbounded_channel();
        let mut engine = Engine::new(model, context, &config);
        engine.set_scheduler(Arc::new(TokioScheduler {
            runtime: runtime.clone(),
            queue: queue.downgrade(),
        }));
        let engine = Arc::new(Mutex::new(engine));

        let worker = Arc::clone(&engine);
        let consumer = runtime.spawn(async move {
            while let Some(command) = inbox.recv().await {
                match command {
                    Command::Signal(signal) => {
                        let result = worker.lock().process(signal);
                        if let Err(err) = result {
                            error!(error = %err, "queued step failed");
                        }
                    }
                    Command::Taken { event, generation } => {
                        let mut engine = worker.lock();
                        if engine.generation() != generation {
                            warn!(%event, "event queued before a pause dropped");
                            continue;
                        }
                        if let Err(err) = engine.take(event) {
                            error!(error = %err, "queued step failed");
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(Self {
            engine,
            queue,
            consumer: consumer.abort_handle(),
        })
    }

    /// Start the machine on the caller's thread.
    pub fn go(&self) -> Result<(), EngineError> {
        self.engine.lock().go()
    }

    /// Queue an event; returns once it is enqueued.
    ///
    /// Returns `Ok(false)` without queueing while the machine is paused.
    pub fn take(&self, event: Event) -> Result<bool, EngineError> {
        let generation = {
            let engine = self.engine.lock();
            if engine.is_paused() {
                warn!(%event, "machine paused; event dropped");
                return Ok(false);
            }
            engine.generation()
        };
        self.queue
            .send(Command::Taken { event, generation })
            .map_err(|_| EngineError::ExecutorClosed)?;
        Ok(true)
    }

    /// Resolve once every signal queued before this call has been processed.
    pub async fn flush(&self) -> Result<(), EngineError> {
        let (done, finished) = oneshot::channel();
        self.queue
            .send(Command::Flush(done))
            .map_err(|_| EngineError::ExecutorClosed)?;
        finished.await.map_err(|_| EngineError::ExecutorClosed)
    }

    /// Waits for the in-flight step, if any. Events taken before the pause
    /// and still queued are dropped, even when `resume` runs before they
    /// are reached. Time events that come due while paused fire on resume.
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
        self.engine.lock().set_model(model);
        Ok(())
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

impl<C> Drop for PooledExecutor<C> {
    fn drop(&mut self) {
        self.consumer.abort();
        self.engine.lock().shutdown();
    }
}

impl<C> std::fmt::Debug for PooledExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledExecutor")
            .field("engine", &*self.engine.lock())
            .finish_non_exhaustive()
    }
}

impl<C: Clone + Send + 'static> Executor<C> for PooledExecutor<C> {
    fn go(&mut self) -> Result<(), EngineError> {
        PooledExecutor::go(self)
    }

    fn take(&mut self, event: Event) -> Result<bool, EngineError> {
        PooledExecutor::take(self, event)
    }

    fn pause(&mut self) -> Result<Snapshot<C>, EngineError> {
        PooledExecutor::pause(self)
    }

    fn resume(&mut self, snapshot: Option<Snapshot<C>>) -> Result<(), EngineError> {
        PooledExecutor::resume(self, snapshot)
    }

    fn restore(&mut self, snapshot: Snapshot<C>) -> Result<(), EngineError> {
        PooledExecutor::restore(self, snapshot)
    }

    fn snapshot(&self) -> Snapshot<C> {
        PooledExecutor::snapshot(self)
    }

    fn set_context(&mut self, context: C) {
        PooledExecutor::set_context(self, context);
    }

    fn set_state_machine(&mut self, model: Arc<ModelGraph<C>>) -> Result<(), EngineError> {
        PooledExecutor::set_state_machine(self, model)
    }

    fn context(&self) -> C {
        PooledExecutor::context(self)
    }

    fn status(&self) -> Status {
        PooledExecutor::status(self)
    }

    fn is_paused(&self) -> bool {
        PooledExecutor::is_paused(self)
    }

    fn is_active(&self, state: &str) -> bool {
        PooledExecutor::is_active(self, state)
    }

    fn active_states(&self) -> Vec<String> {
        PooledExecutor::active_states(self)
    }

    fn instance_id(&self) -> Uuid {
        PooledExecutor::instance_id(self)
    }

    fn add_listener(&mut self, listener: Arc<dyn Listener>) {
        PooledExecutor::add_listener(self, listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;

    fn echo() -> Arc<ModelGraph<Vec<String>>> {
        ModelBuilder::new("echo")
            .initial("i")
            .state("Listening", |s| s)
            .transition("i", "Listening", |t| t)
            .transition("Listening", "Listening", |t| {
                t.on("say").internal().effect(|log: &mut Vec<String>, e: &Event| {
                    let word = e
                        .payload()
                        .and_then(|p| p.as_str())
                        .unwrap_or_default()
                        .to_string();
                    log.push(word);
                })
            })
            .build()
            .unwrap()
    }

    #[test]
    fn outside_a_runtime_a_pool_is_required() {
        assert_eq!(
            PooledExecutor::new(echo(), Vec::new()).unwrap_err(),
            EngineError::NoWorkerPool
        );
    }

    #[test]
    fn explicit_worker_pool_is_used() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = ExecutorConfig::default().worker_pool(runtime.handle().clone());
        let executor = PooledExecutor::with_config(echo(), Vec::new(), config).unwrap();
        executor.go().unwrap();
        executor
            .take(Event::new("say").with_payload(serde_json::json!("hi")))
            .unwrap();
        runtime.block_on(executor.flush()).unwrap();
        assert_eq!(executor.context(), vec!["hi"]);
    }

    #[tokio::test]
    async fn events_are_processed_in_submission_order() {
        let executor = PooledExecutor::new(echo(), Vec::new()).unwrap();
        executor.go().unwrap();
        for word in ["a", "b", "c", "d"] {
            executor
                .take(Event::new("say").with_payload(serde_json::json!(word)))
                .unwrap();
        }
        executor.flush().await.unwrap();
        assert_eq!(executor.context(), vec!["a", "b", "c", "d"]);
    }
}
