//! Core value types shared by the adapters.
//!
//! - [`cancel`]: Cancellation reason and kind types
//! - [`id`]: Task identifiers
//! - [`priority`]: Urgency tiers for spawned work

pub mod cancel;
pub mod id;
pub mod priority;

pub use cancel::{CancelKind, CancelReason};
pub use id::TaskId;
pub use priority::{ParsePriorityError, Priority};
