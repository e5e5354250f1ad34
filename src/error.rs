pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned synchronously by pool operations.
///
/// Failures raised by a task body never show up here; they are captured on the
/// task record as [`TaskStatus::Failed`](crate::TaskStatus::Failed).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pool is shutting down")]
    ShuttingDown,

    #[error("queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("task id already in use: {0}")]
    DuplicateTaskId(String),

    #[error("invalid task id: {0:?}")]
    InvalidTaskId(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(u8),

    #[error("invalid pool size: {0}")]
    InvalidPoolSize(usize),

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    /// True for rejections caused by the pool's lifecycle rather than the caller's input.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::ShuttingDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::ShuttingDown.to_string(), "pool is shutting down");
        assert_eq!(
            Error::QueueFull { capacity: 8 }.to_string(),
            "queue is full (capacity 8)"
        );
        assert_eq!(
            Error::config("num_threads must be > 0").to_string(),
            "config error: num_threads must be > 0"
        );
    }

    #[test]
    fn test_is_shutdown() {
        assert!(Error::ShuttingDown.is_shutdown());
        assert!(!Error::InvalidPoolSize(0).is_shutdown());
    }
}
