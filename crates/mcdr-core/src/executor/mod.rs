//! # Plugin Worker Pool
//!
//! Plugin callbacks never run on the thread that produced the event. They
//! are wrapped into [`Task`]s and executed by a [`WorkerPool`]: a fixed set
//! of persistent workers sharing one priority queue, plus temporary
//! overflow workers spawned on demand.
//!
//! - **[`task`]**: the unit of work and its ordering (priority first, then
//!   submission order).
//! - **[`pool`]**: workers, submission, diagnostics and shutdown.
//! - **[`error`]**: [`CallbackError`] raised by listeners and
//!   [`WorkerPoolError`] raised by the pool infrastructure itself.
pub mod error;
pub mod pool;
pub mod task;

pub use error::{CallbackError, WorkerPoolError};
pub use pool::{OverflowPolicy, TaskHandle, TaskOutcome, WorkerPool, WorkerPoolConfig};
pub use task::{Task, TaskPriority};

#[cfg(test)]
mod tests;
