//! In-memory multi-subscriber emitter.

use super::emitter::{Emitter, EmitterSink, Subscription};
use crate::tracing_compat::trace;
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::sync::{Arc, Weak};

struct SubjectState<T, E> {
    sinks: Slab<EmitterSink<T, E>>,
    terminal: Option<Result<(), E>>,
}

/// A passthrough emitter: everything sent is forwarded to the current
/// subscribers.
///
/// Values sent with no subscribers are lost. A subscriber that arrives after
/// the terminal signal receives that signal immediately.
pub struct Subject<T, E> {
    state: Arc<Mutex<SubjectState<T, E>>>,
}

impl<T: Clone, E: Clone> Subject<T, E> {
    /// Creates a subject with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                sinks: Slab::new(),
                terminal: None,
            })),
        }
    }

    /// Forwards `value` to every subscriber. Returns how many accepted it.
    pub fn send(&self, value: T) -> usize {
        let sinks = self.live_sinks();
        sinks.iter().filter(|sink| sink.send(value.clone())).count()
    }

    /// Completes every subscriber successfully.
    pub fn finish(&self) {
        self.terminate(Ok(()));
    }

    /// Fails every subscriber with `error`.
    pub fn fail(&self, error: E) {
        self.terminate(Err(error));
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    /// Returns true once a terminal signal has been sent.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminal.is_some()
    }

    fn live_sinks(&self) -> Vec<EmitterSink<T, E>> {
        let state = self.state.lock();
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.sinks.iter().map(|(_, sink)| sink.clone()).collect()
    }

    fn terminate(&self, outcome: Result<(), E>) {
        let sinks = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(outcome.clone());
            std::mem::take(&mut state.sinks)
        };
        trace!(subscribers = sinks.len(), ok = outcome.is_ok(), "subject terminated");
        for (_, sink) in sinks {
            match &outcome {
                Ok(()) => sink.finish(),
                Err(err) => sink.fail(err.clone()),
            };
        }
    }
}

impl<T: Clone, E: Clone> Default for Subject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Subject<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, E> fmt::Debug for Subject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Subject")
            .field("subscribers", &state.sinks.len())
            .field("terminated", &state.terminal.is_some())
            .finish()
    }
}

impl<T, E> Emitter<T, E> for Subject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn subscribe(&self, sink: EmitterSink<T, E>) -> Arc<dyn Subscription> {
        let mut state = self.state.lock();
        if let Some(outcome) = state.terminal.clone() {
            drop(state);
            match outcome {
                Ok(()) => sink.finish(),
                Err(err) => sink.fail(err),
            };
            return Arc::new(SubjectSubscription::<T, E> {
                state: Weak::new(),
                key: None,
            });
        }
        let key = state.sinks.insert(sink);
        drop(state);
        Arc::new(SubjectSubscription {
            state: Arc::downgrade(&self.state),
            key: Some(key),
        })
    }
}

struct SubjectSubscription<T, E> {
    state: Weak<Mutex<SubjectState<T, E>>>,
    key: Option<usize>,
}

impl<T: Send, E: Send> Subscription for SubjectSubscription<T, E> {
    fn cancel(&self) {
        let (Some(key), Some(state)) = (self.key, self.state.upgrade()) else {
            return;
        };
        let mut state = state.lock();
        if state.sinks.contains(key) {
            drop(state.sinks.remove(key));
        }
    }
}
