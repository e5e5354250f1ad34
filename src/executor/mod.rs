//! Task execution infrastructure.
//!
//! This module provides the task types, the worker threads that run them and
//! the [`TaskPool`] facade callers submit work through.

pub mod panic_handler;
pub mod pool;
pub(crate) mod state;
pub mod task;
pub(crate) mod worker;

pub use panic_handler::{PanicHandler, PanicStrategy};
pub use pool::TaskPool;
pub use state::PoolState;
pub use task::{CompletionSink, TaskError, TaskId, TaskPriority, TaskStatus};
