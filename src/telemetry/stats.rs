//! Outcome counters and timing for finished tasks.

use crate::executor::task::TaskStatus;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::time::{Duration, Instant, SystemTime};

// One hour, in microseconds.
const MAX_TRACKED_US: u64 = 3_600_000_000;

/// Accumulates completions and failures reported by workers.
///
/// Guarded by its own short-held lock so recording an outcome never contends
/// with the scheduling lock.
#[derive(Debug)]
pub(crate) struct StatsAggregator {
    inner: Mutex<StatsInner>,
    started_at: SystemTime,
    start_instant: Instant,
}

#[derive(Debug)]
struct StatsInner {
    completed: u64,
    failed: u64,
    cancelled: u64,
    average_duration_ms: f64,
    durations_us: Histogram<u64>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        let durations_us = Histogram::new_with_bounds(1, MAX_TRACKED_US, 3)
            .expect("static histogram bounds are valid");

        Self {
            inner: Mutex::new(StatsInner {
                completed: 0,
                failed: 0,
                cancelled: 0,
                average_duration_ms: 0.0,
                durations_us,
            }),
            started_at: SystemTime::now(),
            start_instant: Instant::now(),
        }
    }

    /// Record a task that ran to `Completed` or `Failed`.
    pub fn record_outcome(&self, status: TaskStatus, duration: Duration) {
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let mut inner = self.inner.lock();

        match status {
            TaskStatus::Completed => inner.completed += 1,
            TaskStatus::Failed => inner.failed += 1,
            _ => return,
        }

        let n = (inner.completed + inner.failed) as f64;
        inner.average_duration_ms = (inner.average_duration_ms * (n - 1.0) + duration_ms) / n;

        let us = (duration.as_micros() as u64).clamp(1, MAX_TRACKED_US);
        inner.durations_us.saturating_record(us);
    }

    pub fn record_cancelled(&self, count: usize) {
        if count > 0 {
            self.inner.lock().cancelled += count as u64;
        }
    }

    pub fn snapshot(&self, workers: WorkerCounts) -> PoolStats {
        let inner = self.inner.lock();
        let has_samples = !inner.durations_us.is_empty();
        let quantile_ms = |q: f64| {
            if has_samples {
                inner.durations_us.value_at_quantile(q) as f64 / 1000.0
            } else {
                0.0
            }
        };

        PoolStats {
            worker_count: workers.live,
            target_workers: workers.target,
            active_workers: workers.active,
            pending_count: workers.pending,
            completed_count: inner.completed,
            failed_count: inner.failed,
            cancelled_count: inner.cancelled,
            average_duration_ms: inner.average_duration_ms,
            p50_duration_ms: quantile_ms(0.50),
            p99_duration_ms: quantile_ms(0.99),
            max_duration_ms: if has_samples {
                inner.durations_us.max() as f64 / 1000.0
            } else {
                0.0
            },
            started_at: self.started_at,
            uptime: self.start_instant.elapsed(),
        }
    }
}

/// Scheduling-side numbers read under the pool lock and folded into a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WorkerCounts {
    pub live: usize,
    pub target: usize,
    pub active: usize,
    pub pending: usize,
}

/// Point-in-time copy of pool statistics.
///
/// Fields are read at slightly different instants; they are eventually
/// accurate, not a transactional view.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub worker_count: usize,
    pub target_workers: usize,
    pub active_workers: usize,
    pub pending_count: usize,
    pub completed_count: u64,
    pub failed_count: u64,
    pub cancelled_count: u64,
    /// Running mean over completed and failed tasks.
    pub average_duration_ms: f64,
    pub p50_duration_ms: f64,
    pub p99_duration_ms: f64,
    pub max_duration_ms: f64,
    pub started_at: SystemTime,
    pub uptime: Duration,
}

impl PoolStats {
    pub fn finished_count(&self) -> u64 {
        self.completed_count + self.failed_count
    }

    /// Finished tasks per second of uptime.
    pub fn throughput(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.finished_count() as f64 / seconds
    }

    pub fn failure_rate(&self) -> f64 {
        let finished = self.finished_count();
        if finished == 0 {
            return 0.0;
        }
        self.failed_count as f64 / finished as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts() -> WorkerCounts {
        WorkerCounts {
            live: 2,
            target: 2,
            active: 1,
            pending: 3,
        }
    }

    #[test]
    fn test_incremental_average() {
        let stats = StatsAggregator::new();

        stats.record_outcome(TaskStatus::Completed, Duration::from_millis(10));
        stats.record_outcome(TaskStatus::Failed, Duration::from_millis(20));
        stats.record_outcome(TaskStatus::Completed, Duration::from_millis(30));

        let snapshot = stats.snapshot(counts());
        assert_eq!(snapshot.completed_count, 2);
        assert_eq!(snapshot.failed_count, 1);
        assert!((snapshot.average_duration_ms - 20.0).abs() < 1e-9);
        assert!(snapshot.max_duration_ms >= 29.9);
        assert!(snapshot.p50_duration_ms >= 9.9 && snapshot.p50_duration_ms <= 30.1);
    }

    #[test]
    fn test_non_outcome_status_ignored() {
        let stats = StatsAggregator::new();
        stats.record_outcome(TaskStatus::Cancelled, Duration::from_millis(5));
        stats.record_outcome(TaskStatus::Running, Duration::from_millis(5));

        let snapshot = stats.snapshot(counts());
        assert_eq!(snapshot.finished_count(), 0);
        assert_eq!(snapshot.average_duration_ms, 0.0);
        assert_eq!(snapshot.p99_duration_ms, 0.0);
        assert_eq!(snapshot.max_duration_ms, 0.0);
    }

    #[test]
    fn test_cancelled_counter() {
        let stats = StatsAggregator::new();
        stats.record_cancelled(0);
        stats.record_cancelled(4);
        assert_eq!(stats.snapshot(counts()).cancelled_count, 4);
    }

    #[test]
    fn test_snapshot_carries_worker_counts() {
        let snapshot = StatsAggregator::new().snapshot(counts());
        assert_eq!(snapshot.worker_count, 2);
        assert_eq!(snapshot.active_workers, 1);
        assert_eq!(snapshot.pending_count, 3);
    }

    #[test]
    fn test_failure_rate() {
        let stats = StatsAggregator::new();
        for _ in 0..3 {
            stats.record_outcome(TaskStatus::Completed, Duration::from_millis(1));
        }
        stats.record_outcome(TaskStatus::Failed, Duration::from_millis(1));

        assert_eq!(stats.snapshot(counts()).failure_rate(), 0.25);
    }
}
