//! Executors: the public face of a running machine instance.
//!
//! All three executors drive the same step engine and differ only in how
//! calls are serialized and where background work runs:
//!
//! - [`SyncExecutor`] runs every step on the caller's thread.
//! - [`LockedExecutor`] wraps the engine in a mutex so it can be shared
//!   across threads.
//! - [`PooledExecutor`] queues signals onto a tokio runtime, one step in
//!   flight per instance, and is the only executor that runs activities
//!   and time events.

mod config;
mod locked;
mod pooled;
mod sync;

pub use config::ExecutorConfig;
pub use locked::LockedExecutor;
pub use pooled::PooledExecutor;
pub use sync::SyncExecutor;

use crate::checkpoint::Snapshot;
use crate::core::{Event, ModelGraph};
use crate::engine::Status;
use crate::error::EngineError;
use crate::listener::Listener;
use std::sync::Arc;
use uuid::Uuid;

/// Operations common to every executor.
pub trait Executor<C> {
    /// Start the machine: enter the top-level regions and run to a stable
    /// configuration. Legal only once, from `NotStarted`.
    fn go(&mut self) -> Result<(), EngineError>;

    /// Submit an event.
    ///
    /// Synchronous executors return whether a transition fired. The
    /// pool-backed executor returns as soon as the event is queued.
    fn take(&mut self, event: Event) -> Result<bool, EngineError>;

    /// Stop accepting events and capture the instance.
    fn pause(&mut self) -> Result<Snapshot<C>, EngineError>;

    /// Clear the pause flag, optionally adopting `snapshot` first.
    fn resume(&mut self, snapshot: Option<Snapshot<C>>) -> Result<(), EngineError>;

    /// Adopt `snapshot` without resuming. Legal before start or while paused.
    fn restore(&mut self, snapshot: Snapshot<C>) -> Result<(), EngineError>;

    fn snapshot(&self) -> Snapshot<C>;

    fn set_context(&mut self, context: C);

    /// Replace the model; the instance returns to `NotStarted`.
    fn set_state_machine(&mut self, model: Arc<ModelGraph<C>>) -> Result<(), EngineError>;

    fn context(&self) -> C;

    fn status(&self) -> Status;

    fn is_paused(&self) -> bool;

    fn is_active(&self, state: &str) -> bool;

    /// Names of the active states, parents before children.
    fn active_states(&self) -> Vec<String>;

    fn instance_id(&self) -> Uuid;

    fn add_listener(&mut self, listener: Arc<dyn Listener>);
}

/// Executors without a worker pool cannot run activities or time events.
fn reject_pool_models<C>(model: &ModelGraph<C>) -> Result<(), EngineError> {
    if model.requires_worker_pool() {
        return Err(EngineError::RequiresWorkerPool {
            machine: model.id().to_string(),
        });
    }
    Ok(())
}
