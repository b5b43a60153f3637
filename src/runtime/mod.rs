//! Task spawning and lifecycle-bound execution.
//!
//! - [`StoredTask`]: a type-erased task body with its id and priority
//! - [`Spawn`] / [`ThreadSpawner`]: where task bodies run
//! - [`TaskHandle`]: identify, abort, and join a spawned task
//! - [`TaskRunner`]: mount/unmount-driven work

mod lifecycle;
mod spawn;
mod stored_task;
mod task_handle;

pub use lifecycle::{RunnerState, TaskRunner};
pub use spawn::{Spawn, SpawnError, ThreadSpawner, spawn};
pub use stored_task::StoredTask;
pub use task_handle::TaskHandle;
