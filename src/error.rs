//! Error types for bridged operations.
//!
//! A caller awaiting a bridged operation sees its payload or exactly one
//! [`Error`]. The taxonomy is deliberately small:
//!
//! - **Upstream**: the wrapped operation reported a failure; passed through
//!   verbatim (its `Display` and `source` are the upstream error's own).
//! - **BadResponse**: the completion fired with neither a payload nor an
//!   error, or was dropped without firing at all.
//! - **Cancelled**: cancellation was requested before the operation resolved.
//!   Once requested it wins over any later success or failure.
//! - **PostProcessing**: a side effect after a successful completion (such as
//!   relocating a downloaded file) failed.
//!
//! Nothing here is retried; retry policy belongs to the transport.

use crate::types::CancelReason;
use std::io;
use thiserror::Error;

/// A boxed, thread-safe upstream error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for bridged operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The kind of a bridged-operation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The wrapped operation failed.
    Upstream,
    /// The operation completed without a usable payload or error.
    BadResponse,
    /// The operation was cancelled.
    Cancelled,
    /// A post-success side effect failed.
    PostProcessing,
}

/// Error returned by the one-shot request adapter.
#[derive(Debug, Error)]
pub enum Error {
    /// The wrapped operation reported this error.
    #[error(transparent)]
    Upstream(BoxError),

    /// The completion fired without a usable payload and without an error.
    #[error("bad response: operation completed without a payload or an error")]
    BadResponse,

    /// Cancellation was requested before the operation resolved.
    #[error("operation cancelled: {0}")]
    Cancelled(CancelReason),

    /// A post-success side effect failed.
    #[error("post-processing failed: {0}")]
    PostProcessing(#[source] io::Error),
}

impl Error {
    /// Wraps an upstream error, passing an existing [`Error`] through unchanged.
    ///
    /// Transports sometimes report errors that already came out of another
    /// bridged call; those are unwrapped rather than nested a second time.
    pub fn upstream(error: impl Into<BoxError>) -> Self {
        let boxed: BoxError = error.into();
        match boxed.downcast::<Self>() {
            Ok(inner) => *inner,
            Err(other) => Self::Upstream(other),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::BadResponse => ErrorKind::BadResponse,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::PostProcessing(_) => ErrorKind::PostProcessing,
        }
    }

    /// Returns true if this error is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the cancellation reason, if this is a cancellation.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }

    /// Attempts to view the upstream error as a concrete type.
    #[must_use]
    pub fn upstream_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Upstream(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}
