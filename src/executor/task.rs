//! Task identity, priority, lifecycle status and the work item itself.

use crate::error::{Error, Result};
use crossbeam_channel::Sender;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Error type a task body may return. Its `Display` output becomes the
/// record's `error_message`.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) type TaskFn = Box<dyn FnOnce() -> std::result::Result<(), TaskError> + Send + 'static>;

/// Unique identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// Allocated from the pool's monotonic counter, starting at 1.
    Seq(u64),
    /// Supplied by the caller through `submit_with_id`.
    Named(Arc<str>),
}

impl TaskId {
    pub fn named<S: AsRef<str>>(name: S) -> Self {
        TaskId::Named(Arc::from(name.as_ref()))
    }

    pub fn as_seq(&self) -> Option<u64> {
        match self {
            TaskId::Seq(n) => Some(*n),
            TaskId::Named(_) => None,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Seq(n) => write!(f, "{}", n),
            TaskId::Named(name) => f.write_str(name),
        }
    }
}

impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        TaskId::Seq(n)
    }
}

impl From<&str> for TaskId {
    fn from(name: &str) -> Self {
        TaskId::named(name)
    }
}

/// Priority tier for task scheduling. Higher tiers always run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum TaskPriority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Normal,
        TaskPriority::High,
        TaskPriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl TryFrom<u8> for TaskPriority {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(TaskPriority::Low),
            1 => Ok(TaskPriority::Normal),
            2 => Ok(TaskPriority::High),
            3 => Ok(TaskPriority::Critical),
            other => Err(Error::InvalidPriority(other)),
        }
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "normal" => Ok(TaskPriority::Normal),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            _ => Err(Error::config(format!("unknown priority: {}", s))),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a task.
///
/// `Pending -> Running -> {Completed, Failed}` or `Pending -> Cancelled`.
/// A running task cannot be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub(crate) fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Cancelled)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Receives a task's final status exactly once.
pub struct CompletionSink(Box<dyn FnOnce(&TaskId, TaskStatus) + Send + 'static>);

impl CompletionSink {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&TaskId, TaskStatus) + Send + 'static,
    {
        CompletionSink(Box::new(f))
    }

    /// Sends `(id, status)` on the channel. A disconnected receiver is ignored.
    pub fn channel(tx: Sender<(TaskId, TaskStatus)>) -> Self {
        CompletionSink::new(move |id, status| {
            let _ = tx.send((id.clone(), status));
        })
    }

    pub(crate) fn complete(self, id: &TaskId, status: TaskStatus) {
        (self.0)(id, status);
    }
}

impl fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompletionSink(..)")
    }
}

/// The callable plus its completion sink, owned by the record until a worker
/// claims it.
pub(crate) struct WorkItem {
    pub(crate) func: TaskFn,
    pub(crate) on_complete: Option<CompletionSink>,
}

impl WorkItem {
    pub fn new<F>(f: F, on_complete: Option<CompletionSink>) -> Self
    where
        F: FnOnce() -> std::result::Result<(), TaskError> + Send + 'static,
    {
        WorkItem {
            func: Box::new(f),
            on_complete,
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("has_sink", &self.on_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Low < TaskPriority::Normal);
        assert!(TaskPriority::Normal < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Critical);
        assert_eq!(TaskPriority::default(), TaskPriority::Normal);
    }

    #[test]
    fn test_priority_conversions() {
        assert_eq!(TaskPriority::try_from(3).unwrap(), TaskPriority::Critical);
        assert!(matches!(
            TaskPriority::try_from(9),
            Err(Error::InvalidPriority(9))
        ));
        assert_eq!("HIGH".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        use TaskStatus::*;

        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Pending));

        assert!(Cancelled.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId::Seq(42).to_string(), "42");
        assert_eq!(TaskId::named("nightly-report").to_string(), "nightly-report");
        assert_eq!(TaskId::from(7).as_seq(), Some(7));
        assert_eq!(TaskId::from("x").as_seq(), None);
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = CompletionSink::channel(tx);
        sink.complete(&TaskId::Seq(1), TaskStatus::Completed);
        assert_eq!(rx.recv().unwrap(), (TaskId::Seq(1), TaskStatus::Completed));
    }
}
