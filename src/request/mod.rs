//! One-shot request adapter.
//!
//! Turns an operation that reports through a completion callback and hands
//! back a cancellable [`Job`](crate::sync::Job) into a single awaitable
//! result. See [`request`] and [`request_then`].

mod completion;
mod future;

pub use completion::Completion;
pub use future::{Request, RequestThen, request, request_then};
