//! Lifecycle-bound task runner.
//!
//! A [`TaskRunner`] ties one unit of asynchronous work to the visibility of
//! a component. The host calls [`TaskRunner::on_mount`] when the component
//! appears and [`TaskRunner::on_unmount`] when it goes away:
//!
//! ```text
//! Idle --mount--> Running --body returns--> Finished
//!                    |
//!                    +--unmount--> Cancelled
//! ```
//!
//! A task its spawner drops before it returns counts as `Cancelled`, and its
//! [`Cx`] is cancelled as abandoned.
//!
//! Mounting again from `Finished` or `Cancelled` starts a brand-new task
//! with a new [`TaskId`] and a fresh [`Cx`]. A task left over from an earlier
//! mount never touches the state of the current one.

use super::spawn::AbandonGuard;
use super::{Spawn, SpawnError, StoredTask, TaskHandle};
use crate::config::BridgeConfig;
use crate::cx::Cx;
use crate::sync::pending_result;
use crate::tracing_compat::{debug, trace};
use crate::types::{CancelReason, Priority, TaskId};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Observable state of a [`TaskRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerState {
    /// Never mounted.
    Idle,
    /// A task is running on behalf of the mounted component.
    Running,
    /// The last task ran to completion.
    Finished,
    /// The last task was cancelled by unmount, or dropped by its spawner.
    Cancelled,
}

#[derive(Debug)]
struct Slot {
    state: RunnerState,
    generation: u64,
    current: Option<Cx>,
}

/// Starts work when a component mounts and cancels it when it unmounts.
pub struct TaskRunner<S, A> {
    spawner: S,
    action: A,
    priority: Priority,
    slot: Arc<Mutex<Slot>>,
}

impl<S, A, Fut> TaskRunner<S, A>
where
    S: Spawn,
    A: Fn(Cx) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    /// Creates an idle runner with the default priority.
    pub fn new(spawner: S, action: A) -> Self {
        Self {
            spawner,
            action,
            priority: Priority::default(),
            slot: Arc::new(Mutex::new(Slot {
                state: RunnerState::Idle,
                generation: 0,
                current: None,
            })),
        }
    }

    /// Creates an idle runner using the configured default priority.
    pub fn from_config(spawner: S, action: A, config: &BridgeConfig) -> Self {
        Self::new(spawner, action).priority(config.default_priority)
    }

    /// Sets the priority for tasks started by later mounts.
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Starts a task unless one is already running.
    ///
    /// Returns `Ok(None)` when a task is already running.
    pub fn on_mount(&self) -> Result<Option<TaskHandle>, SpawnError> {
        let cx = Cx::with_priority(self.priority);
        let (generation, previous) = {
            let mut slot = self.slot.lock();
            if slot.state == RunnerState::Running {
                trace!("mount while running ignored");
                return Ok(None);
            }
            let previous = slot.state;
            slot.generation += 1;
            slot.state = RunnerState::Running;
            slot.current = Some(cx.clone());
            (slot.generation, previous)
        };

        let (resolver, done) = pending_result();
        let body = (self.action)(cx.clone());
        let abandon = AbandonGuard::new(cx.clone()).on_abandon({
            let slot = Arc::clone(&self.slot);
            move || settle(&slot, generation, RunnerState::Cancelled)
        });
        let slot = Arc::clone(&self.slot);
        let task = StoredTask::new(cx.task_id(), self.priority, async move {
            body.await;
            abandon.disarm();
            let _ = resolver.resolve(());
            settle(&slot, generation, RunnerState::Finished);
        });

        if let Err(err) = self.spawner.spawn(task) {
            let mut slot = self.slot.lock();
            if slot.generation == generation {
                slot.state = previous;
                slot.current = None;
            }
            debug!(error = %err, state = ?previous, "mount failed to spawn");
            return Err(err);
        }
        debug!(task_id = %cx.task_id(), priority = %self.priority, "mounted task started");
        Ok(Some(TaskHandle::new(cx, done)))
    }
}

/// Moves a still-current `Running` slot to `outcome`; stale tasks are ignored.
fn settle(slot: &Mutex<Slot>, generation: u64, outcome: RunnerState) {
    let mut slot = slot.lock();
    if slot.generation == generation && slot.state == RunnerState::Running {
        slot.state = outcome;
        slot.current = None;
    }
}

impl<S, A> TaskRunner<S, A> {
    /// Cancels the running task, if any.
    ///
    /// Returns true if a task was cancelled. Calling it again is a no-op.
    pub fn on_unmount(&self) -> bool {
        let cx = {
            let mut slot = self.slot.lock();
            if slot.state != RunnerState::Running {
                return false;
            }
            slot.state = RunnerState::Cancelled;
            slot.generation += 1;
            slot.current.take()
        };
        if let Some(cx) = cx {
            debug!(task_id = %cx.task_id(), "unmount cancels task");
            cx.cancel(CancelReason::unmounted());
        }
        true
    }

    /// Returns the runner's current state.
    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.slot.lock().state
    }

    /// Returns the id of the running task, if any.
    #[must_use]
    pub fn current_task(&self) -> Option<TaskId> {
        self.slot.lock().current.as_ref().map(Cx::task_id)
    }

    /// Returns the priority used for new tasks.
    #[must_use]
    pub const fn configured_priority(&self) -> Priority {
        self.priority
    }
}

impl<S, A> Drop for TaskRunner<S, A> {
    fn drop(&mut self) {
        self.on_unmount();
    }
}

impl<S, A> fmt::Debug for TaskRunner<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("TaskRunner")
            .field("state", &slot.state)
            .field("generation", &slot.generation)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ManualSpawner, init_test_logging};
    use crate::types::CancelKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    fn waiting_runner(
        spawner: &ManualSpawner,
        observed: Arc<Mutex<Vec<CancelKind>>>,
    ) -> TaskRunner<&ManualSpawner, impl Fn(Cx) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>> {
        TaskRunner::new(spawner, move |cx: Cx| {
            let observed = Arc::clone(&observed);
            Box::pin(async move {
                let reason = cx.cancelled().await;
                observed.lock().push(reason.kind);
            }) as std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
        })
    }

    #[test]
    fn mount_runs_then_finishes() {
        init_test("mount_runs_then_finishes");
        let spawner = ManualSpawner::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_in = Arc::clone(&runs);
        let runner = TaskRunner::new(&spawner, move |_cx| {
            let runs = Arc::clone(&runs_in);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        })
        .priority(Priority::High);

        assert_eq!(runner.state(), RunnerState::Idle);
        let handle = runner.on_mount().expect("spawn").expect("new task");
        assert_eq!(handle.priority(), Priority::High);
        assert_eq!(runner.state(), RunnerState::Running);
        assert_eq!(runner.current_task(), Some(handle.task_id()));

        spawner.run_pending();
        let state = runner.state();
        crate::assert_with_log!(state == RunnerState::Finished, "finished", RunnerState::Finished, state);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(runner.current_task(), None);
        assert!(!runner.on_unmount());
        crate::test_complete!("mount_runs_then_finishes");
    }

    #[test]
    fn unmount_twice_cancels_once() {
        init_test("unmount_twice_cancels_once");
        let spawner = ManualSpawner::new();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let runner = waiting_runner(&spawner, Arc::clone(&observed));

        let handle = runner.on_mount().expect("spawn").expect("new task");
        spawner.run_pending();

        assert!(runner.on_unmount());
        assert!(!runner.on_unmount());
        spawner.run_pending();

        let kinds = observed.lock().clone();
        crate::assert_with_log!(kinds == vec![CancelKind::Unmounted], "one cancel", vec![CancelKind::Unmounted], kinds);
        assert_eq!(runner.state(), RunnerState::Cancelled);
        assert!(handle.is_finished());
        crate::test_complete!("unmount_twice_cancels_once");
    }

    #[test]
    fn mount_while_running_is_noop() {
        init_test("mount_while_running_is_noop");
        let spawner = ManualSpawner::new();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let runner = waiting_runner(&spawner, observed);

        let first = runner.on_mount().expect("spawn");
        let second = runner.on_mount().expect("spawn");
        assert!(first.is_some());
        assert!(second.is_none());
        crate::assert_with_log!(spawner.len() == 1, "one queued task", 1, spawner.len());
        crate::test_complete!("mount_while_running_is_noop");
    }

    #[test]
    fn remount_starts_new_task_and_ignores_stale_completion() {
        init_test("remount_starts_new_task_and_ignores_stale_completion");
        let spawner = ManualSpawner::new();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let runner = waiting_runner(&spawner, Arc::clone(&observed));

        let first = runner.on_mount().expect("spawn").expect("task");
        assert!(runner.on_unmount());
        let second = runner.on_mount().expect("spawn").expect("task");
        assert_ne!(first.task_id(), second.task_id());

        // The first task now observes its cancellation and returns; it must
        // not mark the second task finished.
        spawner.run_pending();
        assert!(first.is_finished());
        assert!(!second.is_finished());
        let state = runner.state();
        crate::assert_with_log!(state == RunnerState::Running, "still running", RunnerState::Running, state);
        assert_eq!(runner.current_task(), Some(second.task_id()));
        crate::test_complete!("remount_starts_new_task_and_ignores_stale_completion");
    }

    #[test]
    fn dropping_runner_unmounts() {
        init_test("dropping_runner_unmounts");
        let spawner = ManualSpawner::new();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let handle = {
            let runner = waiting_runner(&spawner, Arc::clone(&observed));
            runner.on_mount().expect("spawn").expect("task")
        };
        assert!(handle.is_cancel_requested());
        spawner.run_pending();
        assert_eq!(observed.lock().as_slice(), &[CancelKind::Unmounted]);
        crate::test_complete!("dropping_runner_unmounts");
    }

    /// Accepts tasks until shut down, then refuses them.
    #[derive(Default)]
    struct ClosableSpawner {
        inner: ManualSpawner,
        closed: std::sync::atomic::AtomicBool,
    }

    impl Spawn for ClosableSpawner {
        fn spawn(&self, task: StoredTask) -> Result<(), SpawnError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(SpawnError::Shutdown);
            }
            self.inner.spawn(task)
        }
    }

    #[test]
    fn failed_remount_keeps_previous_state() {
        init_test("failed_remount_keeps_previous_state");
        let spawner = ClosableSpawner::default();
        let runner = TaskRunner::new(&spawner, |_cx| async {});

        runner.on_mount().expect("spawn").expect("task");
        spawner.inner.run_pending();
        assert_eq!(runner.state(), RunnerState::Finished);

        spawner.closed.store(true, Ordering::SeqCst);
        let err = runner.on_mount().unwrap_err();
        assert!(matches!(err, SpawnError::Shutdown));
        let state = runner.state();
        crate::assert_with_log!(
            state == RunnerState::Finished,
            "state restored",
            RunnerState::Finished,
            state
        );
        assert_eq!(runner.current_task(), None);
        crate::test_complete!("failed_remount_keeps_previous_state");
    }

    #[test]
    fn failed_first_mount_stays_idle() {
        init_test("failed_first_mount_stays_idle");
        let spawner = ClosableSpawner::default();
        spawner.closed.store(true, Ordering::SeqCst);
        let runner = TaskRunner::new(&spawner, |_cx| async {});
        assert!(runner.on_mount().is_err());
        assert_eq!(runner.state(), RunnerState::Idle);
        crate::test_complete!("failed_first_mount_stays_idle");
    }

    #[test]
    fn dropped_task_marks_runner_cancelled() {
        init_test("dropped_task_marks_runner_cancelled");
        let spawner = ManualSpawner::new();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let runner = waiting_runner(&spawner, Arc::clone(&observed));

        let handle = runner.on_mount().expect("spawn").expect("task");
        spawner.run_pending();
        spawner.clear();

        assert_eq!(runner.state(), RunnerState::Cancelled);
        let kind = handle.cx().cancel_reason().map(|r| r.kind);
        crate::assert_with_log!(
            kind == Some(CancelKind::Abandoned),
            "abandoned",
            Some(CancelKind::Abandoned),
            kind
        );
        // The body never resumed, so it recorded nothing.
        assert!(observed.lock().is_empty());
        assert!(runner.on_mount().expect("spawn").is_some());
        crate::test_complete!("dropped_task_marks_runner_cancelled");
    }
}
