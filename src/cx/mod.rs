//! Capability context.
//!
//! Every bridged operation runs on behalf of a task, and the task's [`Cx`]
//! is how cancellation reaches it. Adapters register listeners with
//! [`Cx::on_cancel`] so a cancel request is forwarded into the callback job
//! or subscription without polling.

#[allow(clippy::module_inception)]
mod cx;

pub use cx::{CancelListener, Cancelled, Cx};
