//! The push side: emitters, their sinks, and subscriptions.

use super::buffer::SequenceBuffer;
use std::fmt;
use std::sync::Arc;

/// Handle to an active emitter subscription.
///
/// After `cancel` returns the emitter should stop pushing; anything it still
/// pushes is dropped quietly.
pub trait Subscription: Send + Sync {
    /// Stops delivery to this subscriber.
    fn cancel(&self);
}

/// A push-based source of zero or more values followed by at most one
/// terminal signal.
pub trait Emitter<T, E> {
    /// Starts delivering to `sink` and returns the subscription handle.
    ///
    /// Values may be pushed synchronously from inside this call.
    fn subscribe(&self, sink: EmitterSink<T, E>) -> Arc<dyn Subscription>;
}

impl<T, E, F> Emitter<T, E> for F
where
    F: Fn(EmitterSink<T, E>) -> Arc<dyn Subscription>,
{
    fn subscribe(&self, sink: EmitterSink<T, E>) -> Arc<dyn Subscription> {
        self(sink)
    }
}

/// Where an emitter pushes its values and terminal signal.
///
/// Cloneable so an emitter can hand it to several producer threads; every
/// clone feeds the same ordered buffer.
pub struct EmitterSink<T, E> {
    buffer: Arc<SequenceBuffer<T, E>>,
}

impl<T, E> EmitterSink<T, E> {
    pub(crate) const fn new(buffer: Arc<SequenceBuffer<T, E>>) -> Self {
        Self { buffer }
    }

    /// Pushes a value. Returns false if it was dropped because the
    /// sequence is cancelled or already terminated.
    pub fn send(&self, value: T) -> bool {
        self.buffer.push(value)
    }

    /// Signals successful completion.
    pub fn finish(&self) -> bool {
        self.buffer.terminate(Ok(()))
    }

    /// Signals failure. The consumer sees `error` after draining.
    pub fn fail(&self, error: E) -> bool {
        self.buffer.terminate(Err(error))
    }

    /// Returns true once nothing more will be accepted.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }
}

impl<T, E> Clone for EmitterSink<T, E> {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<T, E> fmt::Debug for EmitterSink<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}
