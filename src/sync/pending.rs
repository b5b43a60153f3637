//! Single-resolution result slot.
//!
//! [`pending_result`] returns a [`Resolver`] and a [`PendingResult`]. The
//! first `resolve` wins; later attempts hand their value back untouched. If
//! every resolver is dropped without resolving, the pending side completes
//! with [`Abandoned`] instead of hanging forever. Once the pending side is
//! closed or dropped, resolvers get their value back so the producer can
//! release whatever it holds.

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Error returned when every [`Resolver`] was dropped without resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("result slot abandoned before it was resolved")]
pub struct Abandoned;

enum SlotState<T> {
    Pending,
    Resolved(T),
    Taken,
}

struct Shared<T> {
    state: SlotState<T>,
    resolvers: usize,
    closed: bool,
    waker: Option<Waker>,
}

struct Inner<T> {
    shared: Mutex<Shared<T>>,
}

/// Creates a linked resolver / pending-result pair.
#[must_use]
pub fn pending_result<T>() -> (Resolver<T>, PendingResult<T>) {
    let inner = Arc::new(Inner {
        shared: Mutex::new(Shared {
            state: SlotState::Pending,
            resolvers: 1,
            closed: false,
            waker: None,
        }),
    });
    (
        Resolver {
            inner: Arc::clone(&inner),
        },
        PendingResult { inner },
    )
}

/// Write side of a [`PendingResult`]. Cloneable; only one resolution lands.
pub struct Resolver<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Resolver<T> {
    /// Resolves the slot.
    ///
    /// Returns `Err(value)` if the slot was already resolved or nobody is
    /// left to read it.
    pub fn resolve(&self, value: T) -> Result<(), T> {
        let waker = {
            let mut shared = self.inner.shared.lock();
            if shared.closed || !matches!(shared.state, SlotState::Pending) {
                return Err(value);
            }
            shared.state = SlotState::Resolved(value);
            shared.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    /// Returns true if the slot has been resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self.inner.shared.lock().state, SlotState::Pending)
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        self.inner.shared.lock().resolvers += 1;
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        let waker = {
            let mut shared = self.inner.shared.lock();
            shared.resolvers -= 1;
            if shared.resolvers == 0 && matches!(shared.state, SlotState::Pending) {
                shared.waker.take()
            } else {
                None
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Read side of a single-resolution slot.
#[must_use = "futures do nothing unless polled"]
pub struct PendingResult<T> {
    inner: Arc<Inner<T>>,
}

impl<T> PendingResult<T> {
    /// Takes the value without waiting, if it has been resolved.
    pub fn try_take(&mut self) -> Option<T> {
        let mut shared = self.inner.shared.lock();
        match std::mem::replace(&mut shared.state, SlotState::Taken) {
            SlotState::Resolved(value) => Some(value),
            other => {
                shared.state = other;
                None
            }
        }
    }

    /// Returns true if a value is waiting to be taken.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.inner.shared.lock().state, SlotState::Resolved(_))
    }

    /// Stops accepting resolutions and returns a value that was resolved
    /// but never taken.
    ///
    /// Later `resolve` calls hand their value back.
    pub fn close(&mut self) -> Option<T> {
        let mut shared = self.inner.shared.lock();
        shared.closed = true;
        shared.waker = None;
        match std::mem::replace(&mut shared.state, SlotState::Taken) {
            SlotState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true if every resolver is gone and nothing was resolved.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        let shared = self.inner.shared.lock();
        shared.resolvers == 0 && matches!(shared.state, SlotState::Pending)
    }
}

impl<T> Future for PendingResult<T> {
    type Output = Result<T, Abandoned>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.inner.shared.lock();
        match std::mem::replace(&mut shared.state, SlotState::Taken) {
            SlotState::Resolved(value) => Poll::Ready(Ok(value)),
            SlotState::Taken => Poll::Ready(Err(Abandoned)),
            SlotState::Pending => {
                shared.state = SlotState::Pending;
                if shared.resolvers == 0 {
                    return Poll::Ready(Err(Abandoned));
                }
                let registered = shared
                    .waker
                    .as_ref()
                    .is_some_and(|w| w.will_wake(cx.waker()));
                if !registered {
                    shared.waker = Some(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for PendingResult<T> {
    fn drop(&mut self) {
        let unread = self.close();
        drop(unread);
    }
}

impl<T> fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        let state = match shared.state {
            SlotState::Pending => "pending",
            SlotState::Resolved(_) => "resolved",
            SlotState::Taken => "taken",
        };
        f.debug_struct("PendingResult").field("state", &state).finish()
    }
}
