//! The pull side: [`values`] and the [`Values`] stream.

use super::buffer::SequenceBuffer;
use super::emitter::{Emitter, EmitterSink, Subscription};
use crate::cx::{CancelListener, Cx};
use crate::sync::{GuardedHandle, Job, Registration};
use crate::tracing_compat::{debug, trace};
use futures_lite::Stream;
use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

struct SubscriptionJob(Arc<dyn Subscription>);

impl Job for SubscriptionJob {
    fn cancel(&self) {
        self.0.cancel();
    }
}

/// Subscribes to `emitter` and exposes its output as a pull-based stream.
///
/// The subscription starts immediately, not on first poll, so values pushed
/// before the consumer starts pulling are buffered. Buffering is unbounded.
///
/// The stream yields every value in arrival order. If the emitter finishes,
/// the stream ends once drained. If it fails, the stream yields the drained
/// values, then `Err(error)`, then ends.
///
/// Cancelling `cx`, calling [`Values::cancel`], or dropping the stream
/// cancels the subscription; the stream then ends without yielding the
/// values still buffered.
///
/// # Example
///
/// ```
/// use cancel_bridge::stream::{Subject, values};
/// use cancel_bridge::Cx;
/// use futures_lite::StreamExt;
///
/// let cx = Cx::new();
/// let subject = Subject::<u32, String>::new();
/// let stream = values(&cx, &subject);
/// subject.send(1);
/// subject.send(2);
/// subject.finish();
///
/// let got: Vec<_> = futures_lite::future::block_on(stream.collect());
/// assert_eq!(got, vec![Ok(1), Ok(2)]);
/// ```
pub fn values<T, E, S>(cx: &Cx, emitter: &S) -> Values<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Emitter<T, E> + ?Sized,
{
    let buffer = Arc::new(SequenceBuffer::new());
    let guard = Arc::new(GuardedHandle::new());

    let listener = {
        let buffer = Arc::clone(&buffer);
        let guard = Arc::clone(&guard);
        cx.on_cancel(move |_| {
            buffer.cancel();
            guard.request_cancel();
        })
    };

    let subscription: Arc<dyn Job> =
        Arc::new(SubscriptionJob(emitter.subscribe(EmitterSink::new(Arc::clone(&buffer)))));
    if guard.register(&subscription) == Registration::CancelledOnRegister {
        debug!(task_id = %cx.task_id(), "subscription cancelled on registration");
    } else {
        trace!(task_id = %cx.task_id(), "subscribed");
    }

    Values {
        cx: cx.clone(),
        buffer,
        guard,
        subscription: Some(subscription),
        _listener: listener,
        done: false,
    }
}

/// Stream returned by [`values`].
#[must_use = "streams do nothing unless polled"]
pub struct Values<T, E> {
    cx: Cx,
    buffer: Arc<SequenceBuffer<T, E>>,
    guard: Arc<GuardedHandle>,
    subscription: Option<Arc<dyn Job>>,
    _listener: CancelListener,
    done: bool,
}

impl<T, E> Values<T, E> {
    /// Cancels the subscription and ends the stream.
    ///
    /// Values not yet pulled are discarded.
    pub fn cancel(&self) {
        if self.buffer.cancel() {
            trace!(task_id = %self.cx.task_id(), "values cancelled by consumer");
        }
        self.guard.request_cancel();
    }

    /// Returns true once the stream has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.buffer.is_cancelled()
    }

    /// Number of values pushed but not yet pulled.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of emitter contract violations observed (values or terminal
    /// signals arriving after the first terminal signal).
    #[must_use]
    pub fn contract_violations(&self) -> u64 {
        self.buffer.violations()
    }

    fn release(&mut self) {
        self.done = true;
        self.subscription = None;
    }
}

impl<T> Values<T, Infallible> {
    /// Converts a stream that cannot fail into one yielding bare values.
    pub fn into_infallible(self) -> InfallibleValues<T> {
        InfallibleValues { inner: self }
    }
}

impl<T, E> Stream for Values<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, poll_cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.buffer.poll_pop(poll_cx.waker()) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => {
                this.release();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(err))) => {
                this.release();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (self.buffer.len(), None)
        }
    }
}

impl<T, E> Drop for Values<T, E> {
    fn drop(&mut self) {
        if !self.done {
            self.cancel();
        }
    }
}

impl<T, E> fmt::Debug for Values<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Values")
            .field("task", &self.cx.task_id())
            .field("buffered", &self.buffer.len())
            .field("cancelled", &self.buffer.is_cancelled())
            .field("done", &self.done)
            .finish()
    }
}

/// Stream returned by [`Values::into_infallible`].
#[must_use = "streams do nothing unless polled"]
pub struct InfallibleValues<T> {
    inner: Values<T, Infallible>,
}

impl<T> InfallibleValues<T> {
    /// Cancels the subscription and ends the stream.
    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl<T> Stream for InfallibleValues<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, poll_cx: &mut Context<'_>) -> Poll<Option<T>> {
        match Pin::new(&mut self.get_mut().inner).poll_next(poll_cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(value)),
            Poll::Ready(Some(Err(never))) => match never {},
        }
    }
}

impl<T> fmt::Debug for InfallibleValues<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InfallibleValues").field(&self.inner).finish()
    }
}
