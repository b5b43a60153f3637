//! Spawning seam.
//!
//! The adapters never choose an executor. A [`Spawn`] implementation decides
//! where a [`StoredTask`] runs; [`ThreadSpawner`] is the stock choice and
//! drives each task on its own named thread.

use super::{StoredTask, TaskHandle};
use crate::config::BridgeConfig;
use crate::cx::Cx;
use crate::sync::pending_result;
use crate::tracing_compat::{debug, trace};
use crate::types::{CancelReason, Priority};
use std::future::Future;
use std::io;
use std::thread;

/// Error returned when a spawner cannot accept a task.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The operating system refused to start a worker thread.
    #[error("failed to start worker thread: {0}")]
    Thread(#[from] io::Error),
    /// The spawner has been shut down.
    #[error("spawner is shut down")]
    Shutdown,
}

/// Something that can run a [`StoredTask`] to completion.
pub trait Spawn: Send + Sync {
    /// Accepts `task` for execution.
    fn spawn(&self, task: StoredTask) -> Result<(), SpawnError>;
}

impl<S: Spawn + ?Sized> Spawn for std::sync::Arc<S> {
    fn spawn(&self, task: StoredTask) -> Result<(), SpawnError> {
        (**self).spawn(task)
    }
}

impl<S: Spawn + ?Sized> Spawn for &S {
    fn spawn(&self, task: StoredTask) -> Result<(), SpawnError> {
        (**self).spawn(task)
    }
}

/// Spawns `action` as a new task with a fresh [`Cx`] at `priority`.
pub fn spawn<S, F, Fut>(spawner: &S, priority: Priority, action: F) -> Result<TaskHandle, SpawnError>
where
    S: Spawn + ?Sized,
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let cx = Cx::with_priority(priority);
    let (resolver, done) = pending_result();
    let body = action(cx.clone());
    let abandon = AbandonGuard::new(cx.clone());
    let task = StoredTask::new(cx.task_id(), priority, async move {
        body.await;
        abandon.disarm();
        let _ = resolver.resolve(());
    });
    spawner.spawn(task)?;
    trace!(task_id = %cx.task_id(), priority = %priority, "task spawned");
    Ok(TaskHandle::new(cx, done))
}

/// Cancels a task's [`Cx`] as [`CancelKind::Abandoned`] if the task is
/// dropped before its body returns.
///
/// [`CancelKind::Abandoned`]: crate::types::CancelKind::Abandoned
pub(crate) struct AbandonGuard {
    cx: Cx,
    hook: Option<Box<dyn FnOnce() + Send>>,
    armed: bool,
}

impl AbandonGuard {
    pub(crate) const fn new(cx: Cx) -> Self {
        Self {
            cx,
            hook: None,
            armed: true,
        }
    }

    /// Runs `hook` after the context is cancelled.
    pub(crate) fn on_abandon(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!(task_id = %self.cx.task_id(), "task dropped before finishing");
        self.cx.cancel(CancelReason::abandoned());
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

/// Runs every task on its own named OS thread.
#[derive(Debug, Clone)]
pub struct ThreadSpawner {
    name_prefix: String,
}

impl ThreadSpawner {
    /// Creates a spawner whose threads are named `<prefix>-<priority>-<task>`.
    #[must_use]
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
        }
    }

    /// Creates a spawner using the configured thread name prefix.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.thread_name_prefix.clone())
    }

    /// Returns the thread name prefix.
    #[must_use]
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

impl Spawn for ThreadSpawner {
    fn spawn(&self, task: StoredTask) -> Result<(), SpawnError> {
        let name = format!("{}-{}-{}", self.name_prefix, task.priority(), task.id());
        debug!(thread = %name, "starting task thread");
        thread::Builder::new()
            .name(name)
            .spawn(move || futures_lite::future::block_on(task))?;
        Ok(())
    }
}
