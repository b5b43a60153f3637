//! cancel-bridge: cancel-correct adapters from callbacks and emitters to
//! futures and streams.
//!
//! # Overview
//!
//! Much asynchronous work still arrives in one of two older shapes: an
//! operation that reports through a completion callback and hands back a
//! cancellable job, or a push-based emitter that calls its subscribers with
//! values until it finishes or fails. This crate turns both into the
//! structured shape: a single awaitable result, or a pull-based stream.
//!
//! The hard part is the seam. Values must not be lost, subscriptions must not
//! leak, and a cancel request that races with "the job just started" must
//! still reach the job.
//!
//! # Core Guarantees
//!
//! - **No lost cancels**: a job registered after cancellation was requested is
//!   cancelled before registration returns
//! - **Cancellation wins**: once requested, a bridged request resolves as
//!   [`Error::Cancelled`] whatever the operation reports afterwards
//! - **Single resolution**: a one-shot result is delivered at most once
//! - **Ordered delivery**: streamed values arrive in push order, failure last
//! - **Executor-agnostic**: every adapter is a plain `Future` or `Stream`
//!
//! # Module Structure
//!
//! - [`types`]: Core types (task ids, priorities, cancellation reasons)
//! - [`cx`]: Capability context carrying a task's cancellation signal
//! - [`sync`]: Guarded job handle and single-resolution result slot
//! - [`request`]: One-shot request adapter (callback to future)
//! - [`stream`]: Stream adapter (emitter to stream) and [`Subject`]
//! - [`runtime`]: Spawning and the lifecycle-bound [`TaskRunner`]
//! - [`transport`]: Fetch/download surface and a local file transport
//! - [`config`]: Configuration with environment and TOML overrides
//! - [`error`](mod@error): Error types
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```
//! use cancel_bridge::{Cx, FileTransport, Session};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("hello.txt");
//! std::fs::write(&path, "Hello, world!").unwrap();
//!
//! let cx = Cx::new();
//! let session = Session::new(FileTransport::new());
//! let url = format!("file://{}", path.display());
//! let (body, response) = futures_lite::future::block_on(session.data(&cx, &url)).unwrap();
//! assert_eq!(body, b"Hello, world!");
//! assert_eq!(response.url, url);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod cx;
pub mod error;
pub mod request;
pub mod runtime;
pub mod stream;
pub mod sync;
pub mod tracing_compat;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use config::{BridgeConfig, ConfigError};
pub use cx::Cx;
pub use error::{BoxError, Error, ErrorKind, Result};
pub use request::{Completion, request, request_then};
pub use runtime::{RunnerState, Spawn, TaskHandle, TaskRunner, ThreadSpawner};
pub use stream::{Emitter, EmitterSink, Subject, Subscription, Values, values};
pub use sync::{GuardedHandle, Job, Registration};
pub use transport::{FileTransport, Session, Transport};
pub use types::{CancelKind, CancelReason, Priority, TaskId};
