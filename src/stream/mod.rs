//! Stream adapter: push-based emitters to pull-based streams.
//!
//! An [`Emitter`] pushes values and one terminal signal into an
//! [`EmitterSink`]. [`values`] subscribes to it and returns a [`Values`]
//! stream that yields the pushed values in order, then the failure (if any),
//! then ends.
//!
//! # Cancel Safety
//!
//! Dropping a [`Values`] mid-iteration cancels the subscription. Values
//! already buffered but not yet pulled are discarded.
//!
//! # Backpressure
//!
//! None. The buffer between emitter and consumer is unbounded.

mod buffer;
mod emitter;
mod subject;
mod values;

pub use emitter::{Emitter, EmitterSink, Subscription};
pub use subject::Subject;
pub use values::{InfallibleValues, Values, values};
