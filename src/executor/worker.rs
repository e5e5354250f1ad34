// worker thread loop
use super::state::{PoolState, SchedState, Shared};
use super::task::{TaskId, TaskStatus, WorkItem};
use std::cell::Cell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, trace, Level};

pub type WorkerId = usize;

thread_local! {
    // Address of the `Shared` this thread works for, 0 on non-worker threads.
    static OWNING_POOL: Cell<usize> = const { Cell::new(0) };
}

/// Whether the calling thread is one of the workers of `shared`.
pub(crate) fn is_worker_of(shared: &Arc<Shared>) -> bool {
    OWNING_POOL.with(|owner| owner.get() == Arc::as_ptr(shared) as usize)
}

// a task this worker claimed
struct Job {
    id: TaskId,
    work: WorkItem,
    started_at: Instant,
}

pub(crate) struct Worker {
    pub id: WorkerId,
    shared: Arc<Shared>,
    tasks_executed: u64,
}

impl Worker {
    pub fn new(id: WorkerId, shared: Arc<Shared>) -> Self {
        Self {
            id,
            shared,
            tasks_executed: 0,
        }
    }

    // main loop
    pub fn run(mut self) {
        OWNING_POOL.with(|owner| owner.set(Arc::as_ptr(&self.shared) as usize));
        debug!(worker = self.id, "worker started");

        while let Some(job) = self.next_job() {
            self.execute(job);
        }

        debug!(
            worker = self.id,
            tasks_executed = self.tasks_executed,
            "worker exited"
        );
    }

    /// Block until there is a task to run. `None` means this worker should exit.
    fn next_job(&self) -> Option<Job> {
        let mut state = self.shared.state.lock();

        loop {
            if let Some(entry) = state.queue.pop() {
                let now = Instant::now();
                if let Some(work) = state.registry.claim(&entry.id, now) {
                    state.active_workers += 1;
                    return Some(Job {
                        id: entry.id,
                        work,
                        started_at: now,
                    });
                }

                let message = format!("queued task {} had no claimable record", entry.id);
                self.shared.failure_sink.log(Level::ERROR, &message);
                debug_assert!(false, "{}", message);
                continue;
            }

            // Queue is empty: this is where an excess or stopping worker leaves.
            if state.live_workers > state.target_workers
                || state.lifecycle != PoolState::Running
            {
                self.retire(&mut state);
                return None;
            }

            self.shared.work_available.wait(&mut state);
        }
    }

    fn retire(&self, state: &mut SchedState) {
        state.live_workers -= 1;
        if state.live_workers == 0 && state.lifecycle == PoolState::ShuttingDown {
            state.lifecycle = PoolState::Stopped;
            debug!("last worker exited, pool stopped");
        }
        self.shared.task_done.notify_all();
    }

    fn execute(&mut self, job: Job) {
        let Job {
            id,
            work,
            started_at,
        } = job;
        let WorkItem { func, on_complete } = work;

        trace!(worker = self.id, task = %id, "running task");
        let outcome = self.shared.panic_handler.run_task(func);
        let ended_at = Instant::now();

        let (status, error_message) = match outcome {
            Ok(()) => (TaskStatus::Completed, None),
            Err(failure) => {
                debug!(
                    worker = self.id,
                    task = %id,
                    panicked = failure.panicked,
                    error = %failure.message,
                    "task failed"
                );
                (TaskStatus::Failed, Some(failure.message))
            }
        };

        self.shared
            .state
            .lock()
            .registry
            .update_status(&id, status, error_message, ended_at);

        if let Some(sink) = on_complete {
            self.shared.deliver(sink, &id, status);
        }
        self.shared
            .stats
            .record_outcome(status, ended_at.duration_since(started_at));
        self.tasks_executed += 1;

        let mut state = self.shared.state.lock();
        state.active_workers -= 1;
        self.shared.task_done.notify_all();
    }
}

/// Start a worker thread named `{prefix}-{id}`.
pub(crate) fn spawn(shared: &Arc<Shared>, id: WorkerId) -> std::io::Result<JoinHandle<()>> {
    let name = format!("{}-{}", shared.config.thread_name_prefix, id);
    let mut builder = thread::Builder::new().name(name);

    if let Some(stack_size) = shared.config.stack_size {
        builder = builder.stack_size(stack_size);
    }

    let worker = Worker::new(id, Arc::clone(shared));
    builder.spawn(move || worker.run())
}
