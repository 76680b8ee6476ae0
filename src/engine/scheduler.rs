//! Seam between the step engine and whoever runs its background work.

use crate::core::{Activity, ActivityContext, EventPoster};
use std::time::Duration;
use tokio::task::AbortHandle;

/// Cancellation handle of a task started on state entry.
#[derive(Debug)]
pub(crate) struct TaskHandle(AbortHandle);

impl TaskHandle {
    pub(crate) fn new(handle: AbortHandle) -> Self {
        Self(handle)
    }

    pub(crate) fn cancel(self) {
        self.0.abort();
    }
}

/// Runs activities and time events on behalf of the engine.
///
/// Only the pool-backed executor installs one; without a scheduler the
/// engine never starts background work.
pub(crate) trait Scheduler: Send + Sync {
    /// Launch a do-activity; must not block.
    fn spawn_activity(&self, activity: &Activity, context: ActivityContext) -> TaskHandle;

    /// Arrange for a timer signal carrying `token` after `delay`.
    fn schedule_timer(&self, delay: Duration, token: u64) -> TaskHandle;

    /// Poster handed to activities so they can submit events.
    fn poster(&self) -> EventPoster;
}
