//! The awaiting half of a one-shot request.

use super::Completion;
use crate::cx::{CancelListener, Cx};
use crate::error::Error;
use crate::sync::{GuardedHandle, Job, PendingResult, Registration, pending_result};
use crate::tracing_compat::{debug, trace};
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

type StartFn<T> = Box<dyn FnOnce(Completion<T>) -> Arc<dyn Job> + Send>;
type PostFn<T, U> = Box<dyn FnOnce(T) -> io::Result<U> + Send>;
type DiscardFn<T> = Box<dyn FnOnce(T) + Send>;

enum State<T> {
    Init(StartFn<T>),
    Waiting {
        guard: Arc<GuardedHandle>,
        pending: PendingResult<Result<T, Error>>,
        _listener: CancelListener,
    },
    Done,
}

/// Bridges a callback-driven operation into a future.
///
/// `start` is invoked exactly once, on first poll, with the [`Completion`]
/// the operation must eventually fire. It returns the operation's cancellable
/// [`Job`]. The caller of `start` owns the job; this adapter keeps only a weak
/// reference, so the job must stay alive elsewhere (typically inside the
/// transport) for cancellation to reach it.
///
/// Once `cx` is cancelled, or the returned future is dropped, the job is
/// cancelled and the future resolves as [`Error::Cancelled`] as soon as the
/// operation reports back, whatever it reports.
///
/// # Example
///
/// ```
/// use cancel_bridge::{Cx, Job, request};
/// use std::sync::Arc;
///
/// struct Instant;
/// impl Job for Instant {
///     fn cancel(&self) {}
/// }
///
/// let cx = Cx::new();
/// let fut = request(&cx, |done| {
///     done.succeed("Hello, world!");
///     Arc::new(Instant) as Arc<dyn Job>
/// });
/// let out = futures_lite::future::block_on(fut).unwrap();
/// assert_eq!(out, "Hello, world!");
/// ```
pub fn request<T, F>(cx: &Cx, start: F) -> Request<T>
where
    T: Send + 'static,
    F: FnOnce(Completion<T>) -> Arc<dyn Job> + Send + 'static,
{
    Request {
        cx: cx.clone(),
        state: State::Init(Box::new(start)),
        discard: None,
    }
}

/// Like [`request`], then runs `post` on the payload before resolving.
///
/// `post` runs on the polling task, only after a successful completion and
/// only if cancellation has not been requested. Its failure surfaces as
/// [`Error::PostProcessing`].
pub fn request_then<T, U, F, P>(cx: &Cx, start: F, post: P) -> RequestThen<T, U>
where
    T: Send + 'static,
    F: FnOnce(Completion<T>) -> Arc<dyn Job> + Send + 'static,
    P: FnOnce(T) -> io::Result<U> + Send + 'static,
{
    RequestThen {
        inner: request(cx, start),
        post: Some(Box::new(post)),
    }
}

/// Future returned by [`request`].
#[must_use = "futures do nothing unless polled"]
pub struct Request<T> {
    cx: Cx,
    state: State<T>,
    discard: Option<DiscardFn<T>>,
}

impl<T> Request<T> {
    /// Hands a successful payload to `discard` whenever it arrives but will
    /// never reach the caller: the request was cancelled first, or the
    /// future was dropped with the payload still unread.
    pub fn on_discard<D>(mut self, discard: D) -> Self
    where
        D: FnOnce(T) + Send + 'static,
    {
        self.discard = Some(Box::new(discard));
        self
    }

    /// Returns true once the job has been cancelled through this request.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        match &self.state {
            State::Waiting { guard, .. } => guard.is_cancel_requested(),
            _ => false,
        }
    }

    fn launch(&self, start: StartFn<T>) -> State<T> {
        let guard = Arc::new(GuardedHandle::new());
        let (resolver, pending) = pending_result();

        let listener_guard = Arc::clone(&guard);
        let listener = self.cx.on_cancel(move |_| {
            listener_guard.request_cancel();
        });

        // Only the operation keeps the job alive; the guard holds it weakly.
        let job = start(Completion::new(resolver));
        if guard.register(&job) == Registration::CancelledOnRegister {
            debug!(task_id = %self.cx.task_id(), "job cancelled on registration");
        } else {
            trace!(task_id = %self.cx.task_id(), "request started");
        }
        drop(job);

        State::Waiting {
            guard,
            pending,
            _listener: listener,
        }
    }

    fn discard_payload(&mut self, payload: T) {
        if let Some(discard) = self.discard.take() {
            trace!(task_id = %self.cx.task_id(), "discarding unread payload");
            discard(payload);
        }
    }
}

impl<T: Send + 'static> Future for Request<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, task_cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        if matches!(this.state, State::Init(_)) {
            if let State::Init(start) = std::mem::replace(&mut this.state, State::Done) {
                this.state = this.launch(start);
            }
        }

        let State::Waiting { guard, pending, .. } = &mut this.state else {
            return Poll::Ready(Err(Error::BadResponse));
        };
        let outcome = match Pin::new(pending).poll(task_cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(outcome)) => outcome,
            Poll::Ready(Err(_abandoned)) => Err(Error::BadResponse),
        };

        // Only `cx` cancels the guard while the future is still alive.
        let reason = guard
            .is_cancel_requested()
            .then(|| this.cx.cancel_reason())
            .flatten();
        this.state = State::Done;

        let Some(reason) = reason else {
            return Poll::Ready(outcome);
        };
        debug!(
            task_id = %this.cx.task_id(),
            reason = %reason,
            discarded_ok = outcome.is_ok(),
            "request resolved after cancel"
        );
        if let Ok(payload) = outcome {
            this.discard_payload(payload);
        }
        Poll::Ready(Err(Error::Cancelled(reason)))
    }
}

impl<T> Drop for Request<T> {
    fn drop(&mut self) {
        let State::Waiting { guard, pending, .. } = &mut self.state else {
            return;
        };
        if guard.request_cancel() {
            trace!(task_id = %self.cx.task_id(), "request dropped before resolving");
        }
        // Closing first makes any later completion hand its payload back to
        // the operation instead of parking it here.
        if let Some(Ok(payload)) = pending.close() {
            self.discard_payload(payload);
        }
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Init(_) => "init",
            State::Waiting { .. } => "waiting",
            State::Done => "done",
        };
        f.debug_struct("Request")
            .field("task", &self.cx.task_id())
            .field("state", &state)
            .finish()
    }
}

/// Future returned by [`request_then`].
#[must_use = "futures do nothing unless polled"]
pub struct RequestThen<T, U> {
    inner: Request<T>,
    post: Option<PostFn<T, U>>,
}

impl<T, U> RequestThen<T, U> {
    /// Hands a successful payload to `discard` whenever it will never reach
    /// `post`: cancellation arrived first, or the future was dropped with
    /// the payload still unread.
    pub fn on_discard<D>(mut self, discard: D) -> Self
    where
        D: FnOnce(T) + Send + 'static,
    {
        self.inner = self.inner.on_discard(discard);
        self
    }
}

impl<T: Send + 'static, U> Future for RequestThen<T, U> {
    type Output = Result<U, Error>;

    fn poll(mut self: Pin<&mut Self>, task_cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let payload = match Pin::new(&mut this.inner).poll(task_cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(payload)) => payload,
            Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),
        };
        if let Some(reason) = this.inner.cx.cancel_reason() {
            this.inner.discard_payload(payload);
            return Poll::Ready(Err(Error::Cancelled(reason)));
        }
        let Some(post) = this.post.take() else {
            return Poll::Ready(Err(Error::BadResponse));
        };
        Poll::Ready(post(payload).map_err(Error::PostProcessing))
    }
}

impl<T, U> fmt::Debug for RequestThen<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestThen")
            .field("inner", &self.inner)
            .field("post_pending", &self.post.is_some())
            .finish()
    }
}
