//! The capability context type.
//!
//! `Cx` is the per-task token that carries:
//! - The task's identity ([`TaskId`]) and urgency ([`Priority`])
//! - The cancellation signal and its [`CancelReason`]
//! - Listener registration, so adapters can forward cancellation into
//!   callback-based jobs the moment it is requested
//!
//! # Thread Safety
//!
//! `Cx` is `Send + Sync` and cheap to clone; clones share one cancellation
//! state. The semantic contract is that a `Cx` belongs to one logical task;
//! cancelling it cancels everything that task is awaiting through this crate.
//!
//! # Cancellation is a request
//!
//! Cancelling a `Cx` never unwinds anything by force. It flips the flag,
//! runs registered listeners (which typically tell a job or subscription to
//! stop), and wakes futures awaiting [`Cx::cancelled`]. The adapters then
//! surface [`Error::Cancelled`] once the underlying work actually answers.

use crate::error::Error;
use crate::tracing_compat::{debug, trace};
use crate::types::{CancelKind, CancelReason, Priority, TaskId};
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

type Listener = Box<dyn FnOnce(&CancelReason) + Send>;

struct CxInner {
    task: TaskId,
    priority: Priority,
    state: Mutex<CxState>,
}

struct CxState {
    cancel_reason: Option<CancelReason>,
    listeners: Slab<Listener>,
    wakers: Slab<Waker>,
}

/// The capability context for a task.
///
/// # Example
///
/// ```
/// use cancel_bridge::Cx;
/// use cancel_bridge::types::CancelKind;
///
/// let cx = Cx::new();
/// assert!(cx.checkpoint().is_ok());
///
/// cx.cancel_with(CancelKind::User, Some("user pressed stop"));
/// assert!(cx.is_cancel_requested());
/// assert!(cx.checkpoint().is_err());
/// ```
#[derive(Clone)]
pub struct Cx {
    inner: Arc<CxInner>,
}

impl Cx {
    /// Creates a context with a fresh task id and the default priority.
    #[must_use]
    pub fn new() -> Self {
        Self::with_priority(Priority::default())
    }

    /// Creates a context with a fresh task id and the given priority.
    #[must_use]
    pub fn with_priority(priority: Priority) -> Self {
        Self {
            inner: Arc::new(CxInner {
                task: TaskId::next(),
                priority,
                state: Mutex::new(CxState {
                    cancel_reason: None,
                    listeners: Slab::new(),
                    wakers: Slab::new(),
                }),
            }),
        }
    }

    /// Returns the id of the task this context belongs to.
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.inner.task
    }

    /// Returns the urgency tier of the task.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.state.lock().cancel_reason.is_some()
    }

    /// Returns the current cancellation reason, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.inner.state.lock().cancel_reason.clone()
    }

    /// Checks for cancellation and returns an error if cancelled.
    ///
    /// Convenient with `?` between steps of long-running work.
    pub fn checkpoint(&self) -> Result<(), Error> {
        self.cancel_reason().map_or(Ok(()), |reason| Err(Error::Cancelled(reason)))
    }

    /// Cancels this context with a kind and optional message.
    pub fn cancel_with(&self, kind: CancelKind, message: Option<&'static str>) {
        let mut reason = CancelReason::new(kind);
        reason.message = message;
        self.cancel(reason);
    }

    /// Requests cancellation with the given reason.
    ///
    /// The first request runs every registered listener and wakes every
    /// [`Cx::cancelled`] future. Later requests only strengthen the recorded
    /// reason.
    pub fn cancel(&self, reason: CancelReason) {
        let (listeners, wakers) = {
            let mut state = self.inner.state.lock();
            if let Some(current) = state.cancel_reason.as_mut() {
                current.strengthen(&reason);
                return;
            }
            state.cancel_reason = Some(reason.clone());
            let listeners: Vec<Listener> = state.listeners.drain().collect();
            let wakers: Vec<Waker> = state.wakers.drain().collect();
            drop(state);
            (listeners, wakers)
        };

        debug!(
            task_id = %self.inner.task,
            cancel_kind = %reason.kind,
            listeners = listeners.len(),
            "cancel requested"
        );

        for listener in listeners {
            listener(&reason);
        }
        for waker in wakers {
            waker.wake();
        }
    }

    /// Registers a listener invoked once when cancellation is requested.
    ///
    /// If the context is already cancelled the listener runs synchronously
    /// before this returns. Dropping the returned guard deregisters a listener
    /// that has not fired yet.
    pub fn on_cancel<F>(&self, listener: F) -> CancelListener
    where
        F: FnOnce(&CancelReason) + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if let Some(reason) = state.cancel_reason.clone() {
            drop(state);
            listener(&reason);
            return CancelListener::inert();
        }
        let key = state.listeners.insert(Box::new(listener));
        drop(state);
        CancelListener {
            cx: Arc::downgrade(&self.inner),
            key: Some(key),
        }
    }

    /// Returns a future that resolves once cancellation is requested.
    #[must_use]
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            cx: self.clone(),
            key: None,
        }
    }

    /// Emits a trace-level message attributed to this task.
    #[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
    pub fn trace(&self, message: &str) {
        trace!(task_id = %self.inner.task, "{}", message);
    }
}

impl Default for Cx {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx")
            .field("task", &self.inner.task)
            .field("priority", &self.inner.priority)
            .field("cancel_reason", &self.cancel_reason())
            .finish()
    }
}

/// Registration guard returned by [`Cx::on_cancel`].
///
/// Dropping it removes a listener that has not fired yet.
#[must_use = "dropping the guard deregisters the listener"]
pub struct CancelListener {
    cx: Weak<CxInner>,
    key: Option<usize>,
}

impl CancelListener {
    fn inert() -> Self {
        Self {
            cx: Weak::new(),
            key: None,
        }
    }

    /// Returns true if the listener is still waiting to fire.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        match (self.key, self.cx.upgrade()) {
            (Some(key), Some(inner)) => inner.state.lock().listeners.contains(key),
            _ => false,
        }
    }
}

impl Drop for CancelListener {
    fn drop(&mut self) {
        let (Some(key), Some(inner)) = (self.key.take(), self.cx.upgrade()) else {
            return;
        };
        let mut state = inner.state.lock();
        // After cancellation the slab was drained and is never refilled, so a
        // present key still belongs to this guard.
        if state.listeners.contains(key) {
            drop(state.listeners.remove(key));
        }
    }
}

impl fmt::Debug for CancelListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelListener")
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Future returned by [`Cx::cancelled`].
#[must_use = "futures do nothing unless polled"]
pub struct Cancelled {
    cx: Cx,
    key: Option<usize>,
}

impl Future for Cancelled {
    type Output = CancelReason;

    fn poll(mut self: Pin<&mut Self>, task_cx: &mut Context<'_>) -> Poll<CancelReason> {
        let this = &mut *self;
        let mut state = this.cx.inner.state.lock();
        if let Some(reason) = state.cancel_reason.clone() {
            this.key = None;
            return Poll::Ready(reason);
        }
        match this.key {
            Some(key) if state.wakers.contains(key) => {
                let slot = &mut state.wakers[key];
                if !slot.will_wake(task_cx.waker()) {
                    slot.clone_from(task_cx.waker());
                }
            }
            _ => this.key = Some(state.wakers.insert(task_cx.waker().clone())),
        }
        Poll::Pending
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut state = self.cx.inner.state.lock();
            if state.wakers.contains(key) {
                drop(state.wakers.remove(key));
            }
        }
    }
}

impl fmt::Debug for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancelled")
            .field("task", &self.cx.task_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_logging, noop_waker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn fresh_context_is_not_cancelled() {
        init_test("fresh_context_is_not_cancelled");
        let cx = Cx::new();
        let cancelled = cx.is_cancel_requested();
        crate::assert_with_log!(!cancelled, "fresh cx", false, cancelled);
        crate::assert_with_log!(
            cx.priority() == Priority::UserInitiated,
            "default priority",
            Priority::UserInitiated,
            cx.priority()
        );
        assert!(cx.checkpoint().is_ok());
        crate::test_complete!("fresh_context_is_not_cancelled");
    }

    #[test]
    fn clones_share_cancellation() {
        init_test("clones_share_cancellation");
        let cx = Cx::with_priority(Priority::Low);
        let clone = cx.clone();
        clone.cancel(CancelReason::user("stop"));
        let cancelled = cx.is_cancel_requested();
        crate::assert_with_log!(cancelled, "original sees cancel", true, cancelled);
        let err = cx.checkpoint().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(cx.task_id(), clone.task_id());
        crate::test_complete!("clones_share_cancellation");
    }

    #[test]
    fn listener_fires_once_on_first_cancel() {
        init_test("listener_fires_once_on_first_cancel");
        let cx = Cx::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let guard = cx.on_cancel(move |reason| {
            assert_eq!(reason.kind, CancelKind::Timeout);
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert!(guard.is_armed());

        cx.cancel(CancelReason::timeout());
        cx.cancel(CancelReason::shutdown());

        let count = fired.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 1, "listener fired once", 1, count);
        assert!(!guard.is_armed());
        let kind = cx.cancel_reason().map(|r| r.kind);
        crate::assert_with_log!(
            kind == Some(CancelKind::Shutdown),
            "reason strengthened",
            Some(CancelKind::Shutdown),
            kind
        );
        crate::test_complete!("listener_fires_once_on_first_cancel");
    }

    #[test]
    fn listener_registered_after_cancel_runs_immediately() {
        init_test("listener_registered_after_cancel_runs_immediately");
        let cx = Cx::new();
        cx.cancel_with(CancelKind::User, None);
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let guard = cx.on_cancel(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let count = fired.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 1, "ran synchronously", 1, count);
        assert!(!guard.is_armed());
        crate::test_complete!("listener_registered_after_cancel_runs_immediately");
    }

    #[test]
    fn dropped_listener_never_fires() {
        init_test("dropped_listener_never_fires");
        let cx = Cx::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        drop(cx.on_cancel(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        cx.cancel(CancelReason::default());
        let count = fired.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 0, "deregistered", 0, count);
        crate::test_complete!("dropped_listener_never_fires");
    }

    #[test]
    fn cancelled_future_wakes_on_cancel() {
        init_test("cancelled_future_wakes_on_cancel");
        let cx = Cx::new();
        let waker = noop_waker();
        let mut task_cx = Context::from_waker(&waker);
        let mut fut = Box::pin(cx.cancelled());

        assert!(fut.as_mut().poll(&mut task_cx).is_pending());
        assert!(fut.as_mut().poll(&mut task_cx).is_pending());

        cx.cancel(CancelReason::unmounted());
        let poll = fut.as_mut().poll(&mut task_cx);
        let ok = matches!(&poll, Poll::Ready(r) if r.kind == CancelKind::Unmounted);
        crate::assert_with_log!(ok, "ready with reason", "Ready(unmounted)", poll);
        crate::test_complete!("cancelled_future_wakes_on_cancel");
    }

    #[test]
    fn dropping_pending_cancelled_releases_waker_slot() {
        init_test("dropping_pending_cancelled_releases_waker_slot");
        let cx = Cx::new();
        let waker = noop_waker();
        let mut task_cx = Context::from_waker(&waker);
        {
            let mut fut = Box::pin(cx.cancelled());
            assert!(fut.as_mut().poll(&mut task_cx).is_pending());
        }
        let remaining = cx.inner.state.lock().wakers.len();
        crate::assert_with_log!(remaining == 0, "slot released", 0, remaining);
        crate::test_complete!("dropping_pending_cancelled_releases_waker_slot");
    }

    #[test]
    fn trace_leaves_context_untouched() {
        init_test("trace_leaves_context_untouched");
        let cx = Cx::new();
        cx.trace("checkpoint reached");
        assert!(!cx.is_cancel_requested());
        assert_eq!(cx.cancel_reason(), None);
        crate::test_complete!("trace_leaves_context_untouched");
    }
}
