//! Reporting channel for worker-infrastructure faults.
//!
//! Task-body errors never go through here; they stay on the task record.

use parking_lot::Mutex;
use tracing::Level;

pub trait FailureSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards faults to `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFailureSink;

impl FailureSink for TracingFailureSink {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!(target: "prio_pool::fault", "{}", message);
        } else if level == Level::WARN {
            tracing::warn!(target: "prio_pool::fault", "{}", message);
        } else if level == Level::INFO {
            tracing::info!(target: "prio_pool::fault", "{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!(target: "prio_pool::fault", "{}", message);
        } else {
            tracing::trace!(target: "prio_pool::fault", "{}", message);
        }
    }
}

/// Keeps every reported fault in memory. Handy for asserting on faults in tests.
#[derive(Debug, Default)]
pub struct MemoryFailureSink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryFailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl FailureSink for MemoryFailureSink {
    fn log(&self, level: Level, message: &str) {
        self.entries.lock().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records() {
        let sink = MemoryFailureSink::new();
        assert!(sink.is_empty());

        sink.log(Level::ERROR, "spawn failed");
        sink.log(Level::WARN, "retrying");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (Level::ERROR, "spawn failed".to_string()));
    }

    #[test]
    fn test_tracing_sink_accepts_all_levels() {
        let sink = TracingFailureSink;
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            sink.log(level, "fault");
        }
    }
}
