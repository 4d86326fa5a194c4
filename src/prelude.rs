pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result, TaskFailure};
pub use crate::executor::{Executor, PanicStrategy, Status, TaskFuture, TaskId};
pub use crate::telemetry::MetricsSnapshot;
