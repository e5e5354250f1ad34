//! Queueing side of the pool: what runs next, and what every task's record says.

pub(crate) mod priority;
pub mod registry;

pub(crate) use priority::PriorityQueue;
pub(crate) use registry::{CancelledTask, TaskRecord, TaskRegistry};
pub use registry::TaskInfo;
