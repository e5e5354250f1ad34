//! Per-task records and their lifecycle transitions.
//!
//! The registry is plain data. The pool keeps it behind the same lock as the
//! priority queue, so every transition here is an atomic read-modify-write from
//! the point of view of other threads.

use crate::error::{Error, Result};
use crate::executor::task::{CompletionSink, TaskId, TaskPriority, TaskStatus, WorkItem};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct TaskRecord {
    pub id: TaskId,
    pub priority: TaskPriority,
    /// Submission order, used for FIFO ordering within a tier.
    pub seq: u64,
    pub status: TaskStatus,
    pub submitted_at: Instant,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
    pub error_message: Option<String>,
    pub work: Option<WorkItem>,
}

impl TaskRecord {
    pub fn new(id: TaskId, priority: TaskPriority, seq: u64, work: WorkItem) -> Self {
        Self {
            id,
            priority,
            seq,
            status: TaskStatus::Pending,
            submitted_at: Instant::now(),
            started_at: None,
            ended_at: None,
            error_message: None,
            work: Some(work),
        }
    }

    fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id.clone(),
            priority: self.priority,
            status: self.status,
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            error_message: self.error_message.clone(),
        }
    }
}

/// Point-in-time copy of a task record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub submitted_at: Instant,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
    /// Set only when `status` is `Failed`.
    pub error_message: Option<String>,
}

impl TaskInfo {
    /// Execution time, once the task has finished running.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Time spent queued before a worker claimed the task.
    pub fn queue_time(&self) -> Option<Duration> {
        self.started_at
            .map(|start| start.duration_since(self.submitted_at))
    }
}

/// A task removed from the queue before it ran.
#[derive(Debug)]
pub(crate) struct CancelledTask {
    pub id: TaskId,
    pub priority: TaskPriority,
    pub seq: u64,
    pub on_complete: Option<CompletionSink>,
}

#[derive(Debug, Default)]
pub(crate) struct TaskRegistry {
    records: HashMap<TaskId, TaskRecord>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, record: TaskRecord) -> Result<()> {
        if self.records.contains_key(&record.id) {
            return Err(Error::DuplicateTaskId(record.id.to_string()));
        }
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.records.get(id).map(|r| r.status)
    }

    pub fn info(&self, id: &TaskId) -> Option<TaskInfo> {
        self.records.get(id).map(TaskRecord::info)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Apply a status change if the lifecycle allows it. Returns false, and
    /// leaves the record untouched, when it does not.
    pub fn update_status(
        &mut self,
        id: &TaskId,
        next: TaskStatus,
        error_message: Option<String>,
        now: Instant,
    ) -> bool {
        let Some(record) = self.records.get_mut(id) else {
            return false;
        };
        if !record.status.can_transition_to(next) {
            return false;
        }

        record.status = next;
        match next {
            TaskStatus::Running => record.started_at = Some(now),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                record.ended_at = Some(now);
            }
            TaskStatus::Pending => {}
        }
        if next == TaskStatus::Failed {
            record.error_message = error_message;
        }
        true
    }

    /// Pending -> Running. Hands the work item to the claiming worker.
    pub fn claim(&mut self, id: &TaskId, now: Instant) -> Option<WorkItem> {
        if !self.update_status(id, TaskStatus::Running, None, now) {
            return None;
        }
        self.records.get_mut(id).and_then(|r| r.work.take())
    }

    /// Pending -> Cancelled. The caller is responsible for removing the queue entry.
    pub fn cancel(&mut self, id: &TaskId, now: Instant) -> Option<CancelledTask> {
        if !self.update_status(id, TaskStatus::Cancelled, None, now) {
            return None;
        }
        let record = self.records.get_mut(id)?;
        let on_complete = record.work.take().and_then(|w| w.on_complete);
        Some(CancelledTask {
            id: record.id.clone(),
            priority: record.priority,
            seq: record.seq,
            on_complete,
        })
    }

    /// Drop a record that reached a terminal status.
    pub fn remove_terminal(&mut self, id: &TaskId) -> bool {
        match self.records.get(id) {
            Some(record) if record.status.is_terminal() => {
                self.records.remove(id);
                true
            }
            _ => false,
        }
    }

    pub fn purge_terminal(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| !r.status.is_terminal());
        before - self.records.len()
    }
}
