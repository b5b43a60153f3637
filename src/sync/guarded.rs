//! Race-free job registration and cancellation.
//!
//! A callback-driven operation hands back its cancellable job only after it
//! has started, while a cancel request can arrive from another thread at any
//! moment. [`GuardedHandle`] serializes those two events:
//!
//! - `register` then `request_cancel`: the job is cancelled by the request.
//! - `request_cancel` then `register`: the job is cancelled before
//!   `register` returns.
//!
//! Either way [`Job::cancel`] runs at most once, and never while the slot's
//! lock is held, so a job whose `cancel` re-enters the handle cannot
//! deadlock.
//!
//! The handle keeps only a [`Weak`] reference: the operation that created the
//! job owns it. A job that has already been dropped needs no cancellation.

use crate::tracing_compat::{debug, trace};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

/// A started, cancellable unit of work.
///
/// Cancellation is a request. An implementation should stop soon and then
/// report through whatever completion channel it was given.
pub trait Job: Send + Sync {
    /// Asks the job to stop.
    fn cancel(&self);
}

/// Outcome of [`GuardedHandle::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The job is stored and will be cancelled by a later request.
    Armed,
    /// Cancellation had already been requested; the job was cancelled.
    CancelledOnRegister,
    /// A job was already registered; the new one was ignored.
    Duplicate,
}

#[derive(Default)]
struct Slot {
    job: Option<Weak<dyn Job>>,
    cancel_requested: bool,
}

/// Mutual-exclusion slot pairing one job with a cancel flag.
#[derive(Default)]
pub struct GuardedHandle {
    slot: Mutex<Slot>,
}

impl GuardedHandle {
    /// Creates an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a weak reference to `job`.
    ///
    /// If cancellation was already requested the job is cancelled
    /// synchronously before this returns.
    pub fn register(&self, job: &Arc<dyn Job>) -> Registration {
        let mut slot = self.slot.lock();
        if slot.job.is_some() {
            return Registration::Duplicate;
        }
        slot.job = Some(Arc::downgrade(job));
        let cancel_now = slot.cancel_requested;
        drop(slot);

        if cancel_now {
            trace!("job registered after cancel request, cancelling now");
            job.cancel();
            Registration::CancelledOnRegister
        } else {
            Registration::Armed
        }
    }

    /// Requests cancellation.
    ///
    /// Returns `true` for the request that flipped the flag. Repeated
    /// requests are no-ops.
    pub fn request_cancel(&self) -> bool {
        let job = {
            let mut slot = self.slot.lock();
            if slot.cancel_requested {
                return false;
            }
            slot.cancel_requested = true;
            slot.job.as_ref().and_then(Weak::upgrade)
        };

        if let Some(job) = job {
            debug!("cancelling registered job");
            job.cancel();
        }
        true
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.slot.lock().cancel_requested
    }

    /// Returns true if a job has been registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.slot.lock().job.is_some()
    }
}

impl fmt::Debug for GuardedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("GuardedHandle")
            .field("registered", &slot.job.is_some())
            .field("cancel_requested", &slot.cancel_requested)
            .finish()
    }
}
