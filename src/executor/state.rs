use super::panic_handler::{PanicHandler, PanicInfo};
use super::task::{CompletionSink, TaskId, TaskStatus};
use crate::config::PoolConfig;
use crate::scheduler::{PriorityQueue, TaskRegistry};
use crate::telemetry::{FailureSink, StatsAggregator, WorkerCounts};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Level;

/// Lifecycle of the pool itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting work.
    Running,
    /// A shutdown was requested; workers drain and exit.
    ShuttingDown,
    /// Every worker has exited.
    Stopped,
}

/// Everything guarded by the scheduling lock.
#[derive(Debug)]
pub(crate) struct SchedState {
    pub queue: PriorityQueue,
    pub registry: TaskRegistry,
    pub lifecycle: PoolState,
    pub live_workers: usize,
    pub target_workers: usize,
    pub active_workers: usize,
    pub next_worker_index: usize,
}

impl SchedState {
    pub fn worker_counts(&self) -> WorkerCounts {
        WorkerCounts {
            live: self.live_workers,
            target: self.target_workers,
            active: self.active_workers,
            pending: self.queue.len(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active_workers == 0
    }
}

/// State shared between the facade and every worker thread.
pub(crate) struct Shared {
    pub state: Mutex<SchedState>,
    /// Signalled when work is queued, and on shrink or shutdown.
    pub work_available: Condvar,
    /// Signalled on terminal transitions, worker exits and idle workers.
    pub task_done: Condvar,
    pub stats: StatsAggregator,
    pub panic_handler: PanicHandler,
    pub failure_sink: Arc<dyn FailureSink>,
    pub config: PoolConfig,
    next_id: AtomicU64,
}

impl Shared {
    pub fn new(config: PoolConfig, failure_sink: Arc<dyn FailureSink>, workers: usize) -> Self {
        Self {
            state: Mutex::new(SchedState {
                queue: PriorityQueue::new(),
                registry: TaskRegistry::new(),
                lifecycle: PoolState::Running,
                live_workers: 0,
                target_workers: workers,
                active_workers: 0,
                next_worker_index: 0,
            }),
            work_available: Condvar::new(),
            task_done: Condvar::new(),
            stats: StatsAggregator::new(),
            panic_handler: PanicHandler::new(config.panic_strategy),
            failure_sink,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_task_id(&self) -> TaskId {
        TaskId::Seq(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Invoke a completion sink outside the lock. A panicking sink is contained
    /// and reported as a fault; it does not count as a task panic.
    pub fn deliver(&self, sink: CompletionSink, id: &TaskId, status: TaskStatus) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| sink.complete(id, status))) {
            let info = PanicInfo::from_payload(payload);
            self.failure_sink.log(
                Level::WARN,
                &format!("completion sink panicked for task {}: {}", id, info.message),
            );
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
