//! Task execution infrastructure.
//!
//! This module provides the executor, its worker threads, the shared FIFO
//! queue and the future handles returned on submission.

pub mod future;
pub mod panic_handler;
pub mod pool;
pub(crate) mod queue;
pub mod task;
pub(crate) mod worker;

pub use future::{Status, TaskFuture};
pub use panic_handler::{PanicHandler, PanicStrategy};
pub use pool::Executor;
pub use task::TaskId;
