//! Synchronization primitives shared by the adapters.
//!
//! - [`GuardedHandle`]: serializes "register the job" against "cancel it"
//! - [`pending_result`]: a slot resolved at most once, awaited as a future

pub mod guarded;
pub mod pending;

pub use guarded::{GuardedHandle, Job, Registration};
pub use pending::{Abandoned, PendingResult, Resolver, pending_result};
