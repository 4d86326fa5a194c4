//! Task representation and execution.

use super::future::{Shared, Status, TaskFuture};
use super::panic_handler::PanicHandler;
use crate::error::TaskFailure;
use crate::telemetry::Metrics;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Sequence number assigned by the executor at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(raw: u64) -> Self {
        TaskId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type-erased view of a future's state machine, used by the queue and the
/// workers, which never see the task's output type.
pub(crate) trait Lifecycle: Send + Sync {
    /// `Pending -> Running`. Fails if the task was cancelled first.
    fn try_start(&self) -> bool;

    /// `Pending -> Cancelled`.
    fn cancel(&self) -> bool;
}

type Job = Box<dyn FnOnce(&PanicHandler, &Metrics) -> Status + Send + 'static>;

/// Internal task representation
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) spawn_time: Instant,
    lifecycle: Arc<dyn Lifecycle>,
    job: Job,
}

impl Task {
    /// Pairs a callable with a fresh `Pending` future.
    pub fn new<F, T>(id: TaskId, f: F) -> (Self, TaskFuture<T>)
    where
        F: FnOnce() -> Result<T, TaskFailure> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::new(Shared::new(id));
        let completer = shared.clone();

        let job: Job = Box::new(move |handler: &PanicHandler, metrics: &Metrics| {
            let start = Instant::now();
            let outcome = handler.execute(f).and_then(|r| r);
            // Counted before the status is published: a caller returning
            // from join() must already see this task in the snapshot.
            metrics.record_finished(outcome.is_ok(), start.elapsed());
            completer.complete(outcome)
        });

        let task = Task {
            id,
            spawn_time: Instant::now(),
            lifecycle: shared.clone(),
            job,
        };

        (task, TaskFuture::new(shared))
    }

    /// Claims the task for execution. `false` means it was cancelled and must
    /// be dropped without running.
    pub fn try_start(&self) -> bool {
        self.lifecycle.try_start()
    }

    pub fn cancel(&self) -> bool {
        self.lifecycle.cancel()
    }

    /// Runs the callable, records it in `metrics` and publishes its outcome.
    /// Must follow a successful [`try_start`](Self::try_start).
    pub fn execute(self, handler: &PanicHandler, metrics: &Metrics) -> Status {
        (self.job)(handler, metrics)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}
