//! Scheduled work
//!
//! Timers, fetches and deferred flushes run as Tokio tasks. Each one is
//! represented by a [`TaskHandle`] that the owner cancels explicitly.

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Handle to a spawned task.
///
/// Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    abort: AbortHandle,
}

impl TaskHandle {
    /// Cancel the task. Has no effect once it has finished.
    pub fn cancel(&self) {
        if !self.abort.is_finished() {
            tracing::trace!(task = self.name, "Cancelling task");
        }
        self.abort.abort();
    }

    /// Whether the task has completed or was cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    /// The name given at spawn time.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Spawn a task on the current Tokio runtime.
///
/// Returns `None`, and logs an error, when called outside a runtime.
pub fn spawn<F>(name: &'static str, future: F) -> Option<TaskHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(TaskHandle {
            name,
            abort: handle.spawn(future).abort_handle(),
        }),
        Err(error) => {
            tracing::error!(task = name, error = %error, "No Tokio runtime available, task not started");
            None
        },
    }
}

/// Spawn a task that runs `future` after `delay`.
pub fn spawn_after<F>(name: &'static str, delay: Duration, future: F) -> Option<TaskHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    spawn(name, async move {
        tokio::time::sleep(delay).await;
        future.await;
    })
}
