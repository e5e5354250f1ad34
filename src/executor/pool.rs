use super::state::{PoolState, SchedState, Shared};
use super::task::{CompletionSink, TaskError, TaskId, TaskPriority, TaskStatus, WorkItem};
use super::worker;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::scheduler::{CancelledTask, TaskInfo, TaskRecord};
use crate::telemetry::{FailureSink, PoolStats, TracingFailureSink};
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Level};

/// A priority-scheduled pool of worker threads.
///
/// Tasks are submitted with a [`TaskPriority`] and identified by the returned
/// [`TaskId`], which can be used to query, cancel or wait on them. Workers always
/// take the highest-priority pending task, oldest first within a tier. There is
/// no aging: sustained high-priority load can starve lower tiers indefinitely.
///
/// All methods take `&self`; share the pool across threads with an `Arc`.
/// Dropping the pool performs a graceful [`shutdown`](TaskPool::shutdown).
pub struct TaskPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::with_failure_sink(config, Arc::new(TracingFailureSink))
    }

    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::new(PoolConfig::builder().num_threads(num_threads).build()?)
    }

    /// Create a pool that reports worker-infrastructure faults to `failure_sink`.
    pub fn with_failure_sink(
        config: PoolConfig,
        failure_sink: Arc<dyn FailureSink>,
    ) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        let pool = TaskPool {
            shared: Arc::new(Shared::new(config, failure_sink, num_threads)),
            handles: Mutex::new(Vec::with_capacity(num_threads)),
        };

        {
            let mut state = pool.shared.state.lock();
            pool.spawn_workers(&mut state, num_threads)?;
        }

        info!(workers = num_threads, "task pool started");
        Ok(pool)
    }

    /// Queue `work` at `priority`.
    ///
    /// `on_complete`, when given, is invoked exactly once with the task's final
    /// status, including `Cancelled`. Rejected submissions never invoke it.
    pub fn submit<F>(
        &self,
        work: F,
        priority: TaskPriority,
        on_complete: Option<CompletionSink>,
    ) -> Result<TaskId>
    where
        F: FnOnce() -> std::result::Result<(), TaskError> + Send + 'static,
    {
        self.enqueue(None, WorkItem::new(work, on_complete), priority)
    }

    /// Like [`submit`](TaskPool::submit), under a caller-chosen id.
    ///
    /// The id must be non-empty and not held by any record the pool still keeps.
    pub fn submit_with_id<S, F>(
        &self,
        custom_id: S,
        work: F,
        priority: TaskPriority,
        on_complete: Option<CompletionSink>,
    ) -> Result<TaskId>
    where
        S: AsRef<str>,
        F: FnOnce() -> std::result::Result<(), TaskError> + Send + 'static,
    {
        let custom_id = custom_id.as_ref();
        if custom_id.is_empty() {
            return Err(Error::InvalidTaskId(custom_id.to_string()));
        }

        self.enqueue(
            Some(TaskId::named(custom_id)),
            WorkItem::new(work, on_complete),
            priority,
        )
    }

    /// Queue an infallible closure at `Normal` priority.
    pub fn execute<F>(&self, f: F) -> Result<TaskId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(
            move || {
                f();
                Ok(())
            },
            TaskPriority::Normal,
            None,
        )
    }

    /// Queue a value-producing closure; its value arrives on the returned receiver.
    ///
    /// Nothing is sent if the task panics or is cancelled, so the receiver
    /// disconnects instead.
    pub fn submit_with_result<F, R>(
        &self,
        f: F,
        priority: TaskPriority,
    ) -> Result<(TaskId, Receiver<R>)>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let id = self.submit(
            move || {
                let _ = tx.send(f());
                Ok(())
            },
            priority,
            None,
        )?;
        Ok((id, rx))
    }

    fn enqueue(
        &self,
        id: Option<TaskId>,
        work: WorkItem,
        priority: TaskPriority,
    ) -> Result<TaskId> {
        let mut state = self.shared.state.lock();

        if state.lifecycle != PoolState::Running {
            return Err(Error::ShuttingDown);
        }
        if let Some(capacity) = self.shared.config.max_pending {
            if state.queue.len() >= capacity {
                return Err(Error::QueueFull { capacity });
            }
        }

        let id = id.unwrap_or_else(|| self.shared.next_task_id());
        let seq = state.queue.next_seq();
        state
            .registry
            .register(TaskRecord::new(id.clone(), priority, seq, work))?;
        state.queue.push(id.clone(), priority, seq);
        drop(state);

        self.shared.work_available.notify_one();
        Ok(id)
    }

    /// Cancel a task that has not started yet. Returns false for running,
    /// finished or unknown tasks.
    pub fn cancel(&self, id: &TaskId) -> bool {
        let cancelled = {
            let mut state = self.shared.state.lock();
            let Some(task) = state.registry.cancel(id, Instant::now()) else {
                return false;
            };
            state.queue.remove(task.priority, task.seq);
            self.shared.task_done.notify_all();
            task
        };

        debug!(task = %id, "task cancelled");
        self.finish_cancelled(vec![cancelled]);
        true
    }

    /// Cancel every queued task. Running tasks are unaffected.
    pub fn cancel_all_pending(&self) -> usize {
        let cancelled = {
            let mut state = self.shared.state.lock();
            let state = &mut *state;
            let cancelled = state
                .queue
                .cancel_all_pending(&mut state.registry, Instant::now());
            self.shared.task_done.notify_all();
            cancelled
        };

        let count = cancelled.len();
        if count > 0 {
            debug!(count, "cancelled pending tasks");
        }
        self.finish_cancelled(cancelled);
        count
    }

    fn finish_cancelled(&self, cancelled: Vec<CancelledTask>) {
        self.shared.stats.record_cancelled(cancelled.len());
        for task in cancelled {
            if let Some(sink) = task.on_complete {
                self.shared.deliver(sink, &task.id, TaskStatus::Cancelled);
            }
        }
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.shared.state.lock().registry.status(id)
    }

    pub fn info(&self, id: &TaskId) -> Option<TaskInfo> {
        self.shared.state.lock().registry.info(id)
    }

    /// Block until the task reaches a terminal status or `timeout` elapses.
    ///
    /// A zero timeout waits indefinitely. Returns false on timeout or for an
    /// unknown id. Timing out never cancels the task.
    pub fn wait(&self, id: &TaskId, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| {
            state
                .registry
                .status(id)
                .map(|status| status.is_terminal())
        })
    }

    /// Block until nothing is queued and no worker is running a task, or
    /// `timeout` elapses. A zero timeout waits indefinitely.
    pub fn wait_all(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| Some(state.is_idle()))
    }

    // `done` returning None aborts the wait with false.
    fn wait_until<P>(&self, timeout: Duration, mut done: P) -> bool
    where
        P: FnMut(&SchedState) -> Option<bool>,
    {
        let deadline = if timeout.is_zero() {
            None
        } else {
            Instant::now().checked_add(timeout)
        };

        let mut state = self.shared.state.lock();
        loop {
            match done(&state) {
                None => return false,
                Some(true) => return true,
                Some(false) => {}
            }

            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .task_done
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return done(&state).unwrap_or(false);
                    }
                }
                None => self.shared.task_done.wait(&mut state),
            }
        }
    }

    /// Change the number of workers.
    ///
    /// Growing spawns the extra workers immediately. Shrinking only lowers the
    /// target: running tasks are never interrupted, and excess workers exit the
    /// next time they find the queue empty, so [`size`](TaskPool::size) can lag.
    pub fn resize(&self, num_threads: usize) -> Result<()> {
        if num_threads == 0 || num_threads > PoolConfig::max_threads() {
            return Err(Error::InvalidPoolSize(num_threads));
        }

        let mut state = self.shared.state.lock();
        if state.lifecycle != PoolState::Running {
            return Err(Error::ShuttingDown);
        }

        let previous = state.target_workers;
        state.target_workers = num_threads;

        if num_threads > state.live_workers {
            let missing = num_threads - state.live_workers;
            if let Err(err) = self.spawn_workers(&mut state, missing) {
                state.target_workers = state.live_workers.max(1);
                return Err(err);
            }
        } else if num_threads < state.live_workers {
            self.shared.work_available.notify_all();
        }
        drop(state);

        self.handles.lock().retain(|handle| !handle.is_finished());
        info!(from = previous, to = num_threads, "pool resized");
        Ok(())
    }

    fn spawn_workers(&self, state: &mut MutexGuard<'_, SchedState>, count: usize) -> Result<()> {
        let mut handles = self.handles.lock();

        for _ in 0..count {
            let id = state.next_worker_index;
            match worker::spawn(&self.shared, id) {
                Ok(handle) => {
                    state.next_worker_index += 1;
                    state.live_workers += 1;
                    handles.push(handle);
                }
                Err(e) => {
                    let message = format!("failed to spawn worker {}: {}", id, e);
                    self.shared.failure_sink.log(Level::ERROR, &message);
                    return Err(Error::executor(message));
                }
            }
        }

        Ok(())
    }

    /// Number of live worker threads.
    pub fn size(&self) -> usize {
        self.shared.state.lock().live_workers
    }

    /// Worker count the pool is converging to.
    pub fn target_size(&self) -> usize {
        self.shared.state.lock().target_workers
    }

    pub fn active_workers(&self) -> usize {
        self.shared.state.lock().active_workers
    }

    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Queued tasks in one priority tier.
    pub fn pending_at(&self, priority: TaskPriority) -> usize {
        self.shared.state.lock().queue.len_at(priority)
    }

    /// Task records currently held, finished ones included.
    pub fn record_count(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    pub fn state(&self) -> PoolState {
        self.shared.state.lock().lifecycle
    }

    pub fn stats(&self) -> PoolStats {
        let counts = self.shared.state.lock().worker_counts();
        self.shared.stats.snapshot(counts)
    }

    /// Number of tasks that panicked since the pool started.
    pub fn panic_count(&self) -> usize {
        self.shared.panic_handler.panic_count()
    }

    /// Release a finished task's record. Returns false if the task is unknown or
    /// still pending or running.
    pub fn forget(&self, id: &TaskId) -> bool {
        self.shared.state.lock().registry.remove_terminal(id)
    }

    /// Release every finished task's record.
    pub fn purge_finished(&self) -> usize {
        self.shared.state.lock().registry.purge_terminal()
    }

    /// Stop accepting work, let queued and running tasks finish, and join every
    /// worker.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.lifecycle == PoolState::Running {
                state.lifecycle = PoolState::ShuttingDown;
                info!(pending = state.queue.len(), "graceful shutdown requested");
            }
            if state.live_workers == 0 {
                state.lifecycle = PoolState::Stopped;
            }
            self.shared.work_available.notify_all();
        }

        self.join_workers();

        // Another thread may have taken the handles first; wait for the workers
        // it is joining. A worker calling this would be waiting on itself.
        if !worker::is_worker_of(&self.shared) {
            let mut state = self.shared.state.lock();
            while state.live_workers > 0 {
                self.shared.task_done.wait(&mut state);
            }
        }
    }

    /// Stop accepting work and cancel everything still queued, without waiting
    /// for running tasks. Those finish their current task and then exit.
    pub fn force_shutdown(&self) {
        let cancelled = {
            let mut state = self.shared.state.lock();
            if state.lifecycle == PoolState::Running {
                state.lifecycle = PoolState::ShuttingDown;
            }
            let state = &mut *state;
            let cancelled = state
                .queue
                .cancel_all_pending(&mut state.registry, Instant::now());
            if state.live_workers == 0 {
                state.lifecycle = PoolState::Stopped;
            }
            self.shared.work_available.notify_all();
            self.shared.task_done.notify_all();
            cancelled
        };

        warn!(
            cancelled = cancelled.len(),
            "forced shutdown requested"
        );
        self.finish_cancelled(cancelled);
    }

    fn join_workers(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        let current = thread::current().id();

        for handle in handles {
            // A task that shuts down its own pool cannot join its own thread.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                self.shared
                    .failure_sink
                    .log(Level::ERROR, "worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TaskPool")
            .field("state", &state.lifecycle)
            .field("workers", &state.live_workers)
            .field("pending", &state.queue.len())
            .finish()
    }
}
