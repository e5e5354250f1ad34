pub use crate::config::{PoolConfig, PoolConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{
    CompletionSink, PanicStrategy, PoolState, TaskError, TaskId, TaskPool, TaskPriority,
    TaskStatus,
};
pub use crate::scheduler::TaskInfo;
pub use crate::telemetry::{FailureSink, PoolStats};
