//! Lifecycle notifications and the listener sink.
//!
//! The engine reports everything it does through a single
//! [`Listener::notify`] entry point. Notifications are fire-and-forget: a
//! listener cannot influence the step, and a panicking listener is
//! contained and logged.

use crate::core::{BehaviorError, Event};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Where a callback notification sits relative to the callback.
#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    Before,
    After,
    /// The callback failed; execution continued.
    Exception(BehaviorError),
}

/// Everything the engine reports, in the order it happens.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    MachineStarted { machine: String },
    MachineTerminated { machine: String },
    EventAccepted { event: Event },
    EventDenied { event: Event },
    TransitionStarted { transition: String },
    TransitionEnded { transition: String },
    StateEntry { state: String, phase: Phase },
    StateExit { state: String, phase: Phase },
    /// `Before` when an activity is launched, `After` when it returns,
    /// `Exception` when it fails.
    Activity { state: String, phase: Phase },
    GuardEvaluated { transition: String, passed: bool },
    GuardFailed { transition: String, error: BehaviorError },
    Effect { transition: String, phase: Phase },
    Paused { machine: String },
    Resumed { machine: String },
}

/// Receiver of lifecycle notifications.
pub trait Listener: Send + Sync {
    fn notify(&self, event: &LifecycleEvent);
}

impl<F> Listener for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn notify(&self, event: &LifecycleEvent) {
        self(event)
    }
}

/// Ordered list of listener handles.
#[derive(Clone, Default)]
pub struct Listeners {
    sinks: Vec<Arc<dyn Listener>>,
}

impl Listeners {
    pub fn add(&mut self, listener: Arc<dyn Listener>) {
        self.sinks.push(listener);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver to every listener; panics are caught per listener.
    pub fn notify(&self, event: &LifecycleEvent) {
        for sink in &self.sinks {
            if catch_unwind(AssertUnwindSafe(|| sink.notify(event))).is_err() {
                tracing::warn!(?event, "listener panicked; notification dropped");
            }
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.sinks.len())
            .finish()
    }
}

/// Renders notifications as `tracing` events under the
/// `statewise::lifecycle` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingListener;

impl Listener for TracingListener {
    fn notify(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::StateEntry {
                state,
                phase: Phase::Exception(error),
            }
            | LifecycleEvent::StateExit {
                state,
                phase: Phase::Exception(error),
            }
            | LifecycleEvent::Activity {
                state,
                phase: Phase::Exception(error),
            } => {
                tracing::warn!(target: "statewise::lifecycle", %state, %error, "state behavior failed");
            }
            LifecycleEvent::Effect {
                transition,
                phase: Phase::Exception(error),
            }
            | LifecycleEvent::GuardFailed { transition, error } => {
                tracing::warn!(target: "statewise::lifecycle", %transition, %error, "transition callback failed");
            }
            LifecycleEvent::EventDenied { event } => {
                tracing::debug!(target: "statewise::lifecycle", event = %event, "event denied");
            }
            other => {
                tracing::trace!(target: "statewise::lifecycle", event = ?other);
            }
        }
    }
}

/// Collects every notification; handy in tests and when debugging a model.
///
/// # Example
///
/// ```rust
/// use statewise::{LifecycleEvent, Listener, RecordingListener};
///
/// let recorder = RecordingListener::new();
/// recorder.notify(&LifecycleEvent::MachineStarted { machine: "m".into() });
/// assert_eq!(recorder.events().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// Names of the states entered so far, in order.
    pub fn entered(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::StateEntry {
                    state,
                    phase: Phase::Before,
                } => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Listener for RecordingListener {
    fn notify(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }
}
