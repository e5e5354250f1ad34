use super::registry::{CancelledTask, TaskRegistry};
use crate::executor::task::{TaskId, TaskPriority};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;
use std::time::Instant;

#[derive(Debug, Clone)]
pub(crate) struct QueueEntry {
    pub id: TaskId,
    pub priority: TaskPriority,
    pub seq: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // Greatest entry runs next: highest tier, then earliest submission.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        let priority_cmp = self.priority.cmp(&other.priority);
        if priority_cmp != CmpOrdering::Equal {
            return priority_cmp;
        }

        other.seq.cmp(&self.seq)
    }
}

/// Pending tasks ordered by priority tier, FIFO within a tier.
///
/// Not synchronized on its own; it lives under the pool's scheduling lock
/// together with the [`TaskRegistry`].
#[derive(Debug, Default)]
pub(crate) struct PriorityQueue {
    entries: BTreeSet<QueueEntry>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next submission sequence number.
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn push(&mut self, id: TaskId, priority: TaskPriority, seq: u64) {
        self.entries.insert(QueueEntry { id, priority, seq });
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_last()
    }

    pub fn remove(&mut self, priority: TaskPriority, seq: u64) -> bool {
        // Equality ignores the id, so a placeholder is enough for the lookup.
        let probe = QueueEntry {
            id: TaskId::Seq(0),
            priority,
            seq,
        };
        self.entries.remove(&probe)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len_at(&self, priority: TaskPriority) -> usize {
        self.entries.iter().filter(|e| e.priority == priority).count()
    }

    /// Cancel every queued task and empty the queue, highest priority first.
    pub fn cancel_all_pending(
        &mut self,
        registry: &mut TaskRegistry,
        now: Instant,
    ) -> Vec<CancelledTask> {
        let mut cancelled = Vec::with_capacity(self.entries.len());
        while let Some(entry) = self.entries.pop_last() {
            if let Some(task) = registry.cancel(&entry.id, now) {
                cancelled.push(task);
            }
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::task::{TaskStatus, WorkItem};
    use crate::scheduler::registry::TaskRecord;

    fn push(queue: &mut PriorityQueue, id: u64, priority: TaskPriority) {
        let seq = queue.next_seq();
        queue.push(TaskId::Seq(id), priority, seq);
    }

    fn pop_ids(queue: &mut PriorityQueue) -> Vec<u64> {
        std::iter::from_fn(|| queue.pop())
            .filter_map(|e| e.id.as_seq())
            .collect()
    }

    #[test]
    fn test_priority_queue() {
        let mut queue = PriorityQueue::new();

        push(&mut queue, 1, TaskPriority::Low);
        push(&mut queue, 2, TaskPriority::Critical);
        push(&mut queue, 3, TaskPriority::Normal);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|e| e.priority)
            .collect();
        assert_eq!(
            order,
            vec![TaskPriority::Critical, TaskPriority::Normal, TaskPriority::Low]
        );
    }

    #[test]
    fn test_fifo_within_tier() {
        let mut queue = PriorityQueue::new();

        push(&mut queue, 1, TaskPriority::High);
        push(&mut queue, 2, TaskPriority::Low);
        push(&mut queue, 3, TaskPriority::High);
        push(&mut queue, 4, TaskPriority::Low);
        push(&mut queue, 5, TaskPriority::High);

        assert_eq!(queue.len_at(TaskPriority::High), 3);
        assert_eq!(pop_ids(&mut queue), vec![1, 3, 5, 2, 4]);
    }

    #[test]
    fn test_remove_entry() {
        let mut queue = PriorityQueue::new();
        push(&mut queue, 1, TaskPriority::Normal);
        push(&mut queue, 2, TaskPriority::Normal);

        assert!(queue.remove(TaskPriority::Normal, 0));
        assert!(!queue.remove(TaskPriority::Normal, 0));
        assert_eq!(queue.len(), 1);
        assert_eq!(pop_ids(&mut queue), vec![2]);
    }

    #[test]
    fn test_cancel_all_pending() {
        let mut queue = PriorityQueue::new();
        let mut registry = TaskRegistry::new();

        for (id, priority) in [(1, TaskPriority::Low), (2, TaskPriority::High), (3, TaskPriority::Normal)] {
            let seq = queue.next_seq();
            registry
                .register(TaskRecord::new(
                    TaskId::Seq(id),
                    priority,
                    seq,
                    WorkItem::new(|| Ok(()), None),
                ))
                .unwrap();
            queue.push(TaskId::Seq(id), priority, seq);
        }

        let cancelled = queue.cancel_all_pending(&mut registry, Instant::now());
        let ids: Vec<_> = cancelled.iter().filter_map(|c| c.id.as_seq()).collect();

        assert_eq!(ids, vec![2, 3, 1]);
        assert!(queue.is_empty());
        for id in 1..=3 {
            assert_eq!(registry.status(&TaskId::Seq(id)), Some(TaskStatus::Cancelled));
        }
    }
}
