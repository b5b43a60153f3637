//! Unbounded hand-off buffer between an emitter and a [`Values`] stream.
//!
//! There is no backpressure: every value an emitter pushes is queued until
//! the consumer pulls it or the stream is cancelled.
//!
//! [`Values`]: super::Values

use crate::tracing_compat::{trace, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::task::{Poll, Waker};

#[derive(Debug)]
enum Terminal<E> {
    Open,
    Finished,
    Failed(E),
    /// The failure has been handed to the consumer.
    Delivered,
}

#[derive(Debug)]
struct State<T, E> {
    queue: VecDeque<T>,
    terminal: Terminal<E>,
    cancelled: bool,
    violations: u64,
    waker: Option<Waker>,
}

/// Ordered queue plus a once-only terminal marker.
#[derive(Debug)]
pub(crate) struct SequenceBuffer<T, E> {
    state: Mutex<State<T, E>>,
}

impl<T, E> SequenceBuffer<T, E> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                terminal: Terminal::Open,
                cancelled: false,
                violations: 0,
                waker: None,
            }),
        }
    }

    /// Queues a value. Returns false if the value was dropped.
    pub(crate) fn push(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if state.cancelled {
            return false;
        }
        if !matches!(state.terminal, Terminal::Open) {
            state.violations += 1;
            warn!(violations = state.violations, "value emitted after terminal signal, dropped");
            return false;
        }
        state.queue.push_back(value);
        let waker = state.waker.take();
        drop(state);
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Records the terminal signal. Only the first one counts.
    pub(crate) fn terminate(&self, outcome: Result<(), E>) -> bool {
        let mut state = self.state.lock();
        if state.cancelled {
            return false;
        }
        if !matches!(state.terminal, Terminal::Open) {
            state.violations += 1;
            warn!(violations = state.violations, "duplicate terminal signal ignored");
            return false;
        }
        state.terminal = match outcome {
            Ok(()) => Terminal::Finished,
            Err(err) => Terminal::Failed(err),
        };
        trace!(buffered = state.queue.len(), "emitter terminated");
        let waker = state.waker.take();
        drop(state);
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Marks the buffer cancelled and discards undelivered values.
    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.cancelled {
            return false;
        }
        state.cancelled = true;
        let discarded = std::mem::take(&mut state.queue);
        let waker = state.waker.take();
        drop(state);
        trace!(discarded = discarded.len(), "sequence cancelled");
        drop(discarded);
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Pulls the next item, registering `waker` when nothing is ready.
    ///
    /// `Ready(None)` means the sequence is over, either because the emitter
    /// finished and the queue is drained or because it was cancelled.
    pub(crate) fn poll_pop(&self, waker: &Waker) -> Poll<Option<Result<T, E>>> {
        let mut state = self.state.lock();
        if state.cancelled {
            return Poll::Ready(None);
        }
        if let Some(value) = state.queue.pop_front() {
            return Poll::Ready(Some(Ok(value)));
        }
        match std::mem::replace(&mut state.terminal, Terminal::Delivered) {
            Terminal::Open => {
                state.terminal = Terminal::Open;
                let registered = state.waker.as_ref().is_some_and(|w| w.will_wake(waker));
                if !registered {
                    state.waker = Some(waker.clone());
                }
                Poll::Pending
            }
            Terminal::Finished => {
                state.terminal = Terminal::Finished;
                Poll::Ready(None)
            }
            Terminal::Failed(err) => Poll::Ready(Some(Err(err))),
            Terminal::Delivered => Poll::Ready(None),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        let state = self.state.lock();
        state.cancelled || !matches!(state.terminal, Terminal::Open)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub(crate) fn violations(&self) -> u64 {
        self.state.lock().violations
    }
}
