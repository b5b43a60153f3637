//! Handle to a spawned task.
//!
//! `TaskHandle` is returned by [`spawn`](super::spawn) and
//! [`TaskRunner::on_mount`](super::TaskRunner::on_mount). It identifies the
//! task, lets the holder request cancellation, and can be awaited for the
//! task's completion.
//!
//! # Ownership
//!
//! The handle does not own the task; the spawner does. Dropping the handle
//! leaves the task running.

use crate::cx::Cx;
use crate::sync::{Abandoned, PendingResult};
use crate::types::{CancelReason, Priority, TaskId};
use std::fmt;

/// A handle to a spawned task.
pub struct TaskHandle {
    cx: Cx,
    done: PendingResult<()>,
}

impl TaskHandle {
    pub(crate) const fn new(cx: Cx, done: PendingResult<()>) -> Self {
        Self { cx, done }
    }

    /// Returns the id of the spawned task.
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.cx.task_id()
    }

    /// Returns the priority the task was spawned with.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.cx.priority()
    }

    /// Returns the task's capability context.
    #[must_use]
    pub const fn cx(&self) -> &Cx {
        &self.cx
    }

    /// Returns true once the task body has run to completion.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done.is_ready()
    }

    /// Returns true if cancellation has been requested for the task.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cx.is_cancel_requested()
    }

    /// Requests cancellation of the task.
    ///
    /// The task observes the request at its next checkpoint or bridged await.
    pub fn abort(&self) {
        self.abort_with(CancelReason::user("task aborted"));
    }

    /// Requests cancellation with a specific reason.
    pub fn abort_with(&self, reason: CancelReason) {
        self.cx.cancel(reason);
    }

    /// Waits for the task body to finish.
    ///
    /// Returns [`Abandoned`] if the spawner dropped the task before it
    /// completed.
    pub async fn join(self) -> Result<(), Abandoned> {
        self.done.await
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task_id", &self.task_id())
            .field("finished", &self.is_finished())
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}
