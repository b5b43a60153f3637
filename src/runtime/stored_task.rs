//! Stored task type handed to spawners.
//!
//! `StoredTask` wraps a type-erased future together with the identity and
//! priority of the task it runs, so a [`Spawn`](super::Spawn) implementation
//! can name, queue, or prioritize it without knowing what it does.

use crate::types::{Priority, TaskId};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A type-erased unit of work ready to be driven by a spawner.
pub struct StoredTask {
    id: TaskId,
    priority: Priority,
    future: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl StoredTask {
    /// Wraps `future` as the body of task `id`.
    pub fn new<F>(id: TaskId, priority: Priority, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            id,
            priority,
            future: Box::pin(future),
        }
    }

    /// Returns the id of the task.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the priority the task was spawned with.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Polls the task body once.
    pub fn poll(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.future.as_mut().poll(cx)
    }
}

impl Future for StoredTask {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().future.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for StoredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
