//! Failure containment at the worker boundary.
//!
//! Every task body runs inside [`PanicHandler::run_task`]. An `Err` return and
//! a panic both end up as a [`TaskFailure`]; neither escapes the worker.

use super::task::TaskFn;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Record the panic on the task and say nothing.
    Isolate,
    /// Record the panic on the task and emit a `warn` event.
    #[default]
    LogAndContinue,
}

#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);
                let info = PanicInfo::from_payload(payload);

                if self.strategy == PanicStrategy::LogAndContinue {
                    tracing::warn!(message = %info.message, "task panicked");
                }

                Err(info)
            }
        }
    }

    /// Run a task body, folding both error returns and panics into a failure.
    pub(crate) fn run_task(&self, func: TaskFn) -> Result<(), TaskFailure> {
        match self.execute(func) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TaskFailure {
                message: err.to_string(),
                panicked: false,
            }),
            Err(info) => Err(TaskFailure {
                message: info.message,
                panicked: true,
            }),
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}

/// Why a task ended as `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TaskFailure {
    pub message: String,
    pub panicked: bool,
}
