//! The callback half of a one-shot request.

use crate::error::{BoxError, Error};
use crate::sync::Resolver;
use std::fmt;

/// Completion callback handed to a job's start function.
///
/// Consuming `self` makes double completion unrepresentable. Dropping a
/// `Completion` without calling any method resolves the request as
/// [`Error::BadResponse`].
pub struct Completion<T> {
    resolver: Resolver<Result<T, Error>>,
}

impl<T> Completion<T> {
    pub(crate) const fn new(resolver: Resolver<Result<T, Error>>) -> Self {
        Self { resolver }
    }

    /// Reports a payload.
    pub fn succeed(self, payload: T) {
        self.deliver(Ok(payload));
    }

    /// Reports a payload, handing it back if the request is no longer
    /// waiting for it.
    ///
    /// Use this when the payload owns something (a staged file, a lease)
    /// that must be released if nobody will receive it.
    pub fn try_succeed(self, payload: T) -> Result<(), T> {
        match self.resolver.resolve(Ok(payload)) {
            Ok(()) => Ok(()),
            Err(Ok(payload)) => Err(payload),
            // Only a payload was offered above.
            Err(Err(_)) => Ok(()),
        }
    }

    /// Reports an upstream failure, passed to the caller verbatim.
    pub fn fail(self, error: impl Into<BoxError>) {
        self.deliver(Err(Error::upstream(error)));
    }

    /// Reports a raw callback result.
    ///
    /// A payload wins over an error; if both are absent the request fails
    /// with [`Error::BadResponse`].
    pub fn complete(self, payload: Option<T>, error: Option<BoxError>) {
        let outcome = match (payload, error) {
            (Some(payload), _) => Ok(payload),
            (None, Some(error)) => Err(Error::upstream(error)),
            (None, None) => Err(Error::BadResponse),
        };
        self.deliver(outcome);
    }

    fn deliver(self, outcome: Result<T, Error>) {
        // The slot only ever sees this one resolver, so this cannot lose.
        let _ = self.resolver.resolve(outcome);
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}
