//! Test utilities for cancel-bridge.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A no-op waker for hand-polling futures
//! - Recording jobs and subscriptions that count cancellations
//! - A manual spawner for deterministic task scheduling
//!
//! # Example
//! ```
//! use cancel_bridge::test_utils::{init_test_logging, RecordingJob};
//!
//! init_test_logging();
//! let job = RecordingJob::new();
//! assert_eq!(job.cancel_count(), 0);
//! ```

use crate::runtime::{Spawn, SpawnError, StoredTask};
use crate::stream::Subscription;
use crate::sync::Job;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::task::{Context, Wake, Waker};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}
}

/// Returns a waker that does nothing.
#[must_use]
pub fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWaker))
}

/// A [`Job`] that counts how often it was cancelled.
#[derive(Debug, Default)]
pub struct RecordingJob {
    cancels: Arc<AtomicUsize>,
}

impl RecordingJob {
    /// Creates a job with a zero cancel count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `cancel` calls so far.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Shared counter that outlives the job.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.cancels)
    }
}

impl Job for RecordingJob {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`Subscription`] that counts how often it was cancelled.
#[derive(Debug, Default)]
pub struct RecordingSubscription {
    cancels: AtomicUsize,
}

impl RecordingSubscription {
    /// Creates a subscription with a zero cancel count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `cancel` calls so far.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl Subscription for RecordingSubscription {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// A spawner that queues tasks until the test polls them.
#[derive(Debug, Default)]
pub struct ManualSpawner {
    queue: Mutex<Vec<StoredTask>>,
}

impl ManualSpawner {
    /// Creates an empty spawner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued, unfinished tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Polls every queued task once with a no-op waker. Returns how many
    /// tasks completed.
    pub fn run_pending(&self) -> usize {
        let mut tasks = std::mem::take(&mut *self.queue.lock());
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let before = tasks.len();
        tasks.retain_mut(|task| task.poll(&mut cx).is_pending());
        let completed = before - tasks.len();
        let mut queue = self.queue.lock();
        tasks.append(&mut *queue);
        *queue = tasks;
        completed
    }

    /// Drops every queued task without running it.
    pub fn clear(&self) {
        let tasks = std::mem::take(&mut *self.queue.lock());
        drop(tasks);
    }
}

impl Spawn for ManualSpawner {
    fn spawn(&self, task: StoredTask) -> Result<(), SpawnError> {
        self.queue.lock().push(task);
        Ok(())
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
