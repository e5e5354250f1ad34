//! Telemetry and observability subsystem.
//!
//! Outcome statistics for finished tasks, and the sink that receives
//! worker-infrastructure faults.

pub mod failure;
pub mod stats;

pub use failure::{FailureSink, MemoryFailureSink, TracingFailureSink};
pub use stats::PoolStats;

pub(crate) use stats::{StatsAggregator, WorkerCounts};
