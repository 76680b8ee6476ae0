//! User callbacks attached to states and transitions.
//!
//! Entry, exit and effect behaviors run synchronously inside a step and get
//! mutable access to the execution context. Activities are long-running and
//! only run on the pool-backed executor, detached from the step.

use super::event::Event;
use super::ids::VertexId;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a user callback.
///
/// Callback failures never abort a step: they are reported to the listener
/// sink and execution continues.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BehaviorError {
    #[error("{0}")]
    Failed(String),

    #[error("callback panicked: {0}")]
    Panicked(String),
}

impl BehaviorError {
    /// Shorthand for [`BehaviorError::Failed`].
    pub fn msg(message: impl Into<String>) -> Self {
        BehaviorError::Failed(message.into())
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        BehaviorError::Panicked(message)
    }
}

/// Values a behavior closure may return.
pub trait BehaviorOutput {
    fn into_outcome(self) -> Result<(), BehaviorError>;
}

impl BehaviorOutput for () {
    fn into_outcome(self) -> Result<(), BehaviorError> {
        Ok(())
    }
}

impl BehaviorOutput for Result<(), BehaviorError> {
    fn into_outcome(self) -> Result<(), BehaviorError> {
        self
    }
}

type BehaviorFn<C> = Arc<dyn Fn(&mut C, &Event) -> Result<(), BehaviorError> + Send + Sync>;

/// Entry, exit or effect behavior.
pub struct Behavior<C> {
    run: BehaviorFn<C>,
}

impl<C> Behavior<C> {
    /// Wrap a closure returning `()` or `Result<(), BehaviorError>`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use statewise::{Behavior, Event};
    ///
    /// let log = Behavior::new(|trace: &mut Vec<String>, event: &Event| {
    ///     trace.push(format!("saw {}", event.name()));
    /// });
    ///
    /// let mut trace = Vec::new();
    /// log.invoke(&mut trace, &Event::new("ping")).unwrap();
    /// assert_eq!(trace, vec!["saw ping".to_string()]);
    /// ```
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&mut C, &Event) -> R + Send + Sync + 'static,
        R: BehaviorOutput,
    {
        Self {
            run: Arc::new(move |ctx: &mut C, event: &Event| f(ctx, event).into_outcome()),
        }
    }

    /// Run the behavior inside a failure boundary; panics are folded into
    /// [`BehaviorError::Panicked`].
    pub fn invoke(&self, context: &mut C, event: &Event) -> Result<(), BehaviorError> {
        catch_unwind(AssertUnwindSafe(|| (self.run)(context, event)))
            .unwrap_or_else(|payload| Err(BehaviorError::from_panic(payload)))
    }
}

impl<C> Clone for Behavior<C> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}

/// Boxed future returned by an activity.
pub type ActivityFuture = Pin<Box<dyn Future<Output = Result<(), BehaviorError>> + Send>>;

type ActivityFn = Arc<dyn Fn(ActivityContext) -> ActivityFuture + Send + Sync>;

pub(crate) type EventPoster = Arc<dyn Fn(Event) -> bool + Send + Sync>;

/// Handle given to a running activity.
///
/// Activities cannot touch the execution context (it is owned by the step);
/// they talk back to their machine by posting events.
#[derive(Clone)]
pub struct ActivityContext {
    state: VertexId,
    state_name: String,
    events: EventPoster,
}

impl ActivityContext {
    pub(crate) fn new(state: VertexId, state_name: String, events: EventPoster) -> Self {
        Self {
            state,
            state_name,
            events,
        }
    }

    /// State whose activity this is.
    pub fn state(&self) -> VertexId {
        self.state
    }

    pub fn state_name(&self) -> &str {
        &self.state_name
    }

    /// Submit an event to the owning machine's queue.
    ///
    /// Returns `false` when the machine is gone.
    pub fn post(&self, event: impl Into<Event>) -> bool {
        (self.events)(event.into())
    }
}

/// A do-activity: runs asynchronously while its state is active and is
/// aborted when the state is exited.
pub struct Activity {
    run: ActivityFn,
}

impl Activity {
    /// Wrap an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ActivityContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BehaviorError>> + Send + 'static,
    {
        Self {
            run: Arc::new(move |ctx| -> ActivityFuture { Box::pin(f(ctx)) }),
        }
    }

    pub(crate) fn start(&self, context: ActivityContext) -> ActivityFuture {
        (self.run)(context)
    }
}

impl std::fmt::Debug for ActivityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityContext")
            .field("state", &self.state)
            .field("state_name", &self.state_name)
            .finish_non_exhaustive()
    }
}

impl Clone for Activity {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}
