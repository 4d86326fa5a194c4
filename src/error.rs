use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("executor is shut down; submission rejected")]
    ShutDown,

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("shutdown timed out after {waited:?} with {live_workers} worker(s) still draining")]
    ShutdownTimeout { waited: Duration, live_workers: usize },

    #[error("task failed: {0}")]
    TaskFailed(TaskFailure),

    #[error("task was cancelled before it started")]
    Cancelled,
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}

/// How a task ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The callable panicked.
    Panicked,
    /// A fallible callable returned `Err`.
    Returned,
}

/// Failure detail stored in a `Failed` future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn panicked<S: Into<String>>(message: S) -> Self {
        Self {
            kind: FailureKind::Panicked,
            message: message.into(),
        }
    }

    pub fn returned<S: Into<String>>(message: S) -> Self {
        Self {
            kind: FailureKind::Returned,
            message: message.into(),
        }
    }

    pub fn is_panic(&self) -> bool {
        self.kind == FailureKind::Panicked
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Panicked => write!(f, "panicked: {}", self.message),
            FailureKind::Returned => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TaskFailure {}
