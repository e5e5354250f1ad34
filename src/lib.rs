//! A priority-scheduled task execution pool.
//!
//! Callers submit units of work with a priority and get back a [`TaskId`] they
//! can query, cancel or wait on. A bounded set of worker threads drains the work
//! in priority order.
//!
//! # Quick Start
//!
//! ```no_run
//! use prio_pool::prelude::*;
//! use std::time::Duration;
//!
//! let pool = TaskPool::new(PoolConfig::builder().num_threads(4).build()?)?;
//!
//! let id = pool.submit(
//!     || {
//!         println!("urgent work");
//!         Ok(())
//!     },
//!     TaskPriority::Critical,
//!     None,
//! )?;
//!
//! assert!(pool.wait(&id, Duration::from_secs(5)));
//! assert_eq!(pool.status(&id), Some(TaskStatus::Completed));
//!
//! pool.shutdown();
//! # Ok::<(), prio_pool::Error>(())
//! ```
//!
//! # Scheduling
//!
//! - **Strict priority**: `Critical > High > Normal > Low`, FIFO within a tier.
//!   There is no aging, so lower tiers can starve under sustained load.
//! - **No preemption**: only pending tasks can be cancelled.
//! - **Failure containment**: an `Err` return or a panic marks that one task
//!   `Failed` with its message; the worker keeps going.
//! - **Resizable**: growing is immediate, shrinking happens as workers go idle.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod scheduler;
pub mod telemetry;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{Error, Result};
pub use executor::{
    CompletionSink, PanicStrategy, PoolState, TaskError, TaskId, TaskPool, TaskPriority,
    TaskStatus,
};
pub use scheduler::TaskInfo;
pub use telemetry::{FailureSink, MemoryFailureSink, PoolStats, TracingFailureSink};
