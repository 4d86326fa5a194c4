//! Completion handles returned by [`Executor::submit`](super::Executor::submit).
//!
//! A [`TaskFuture`] is shared between the submitting caller and the one worker
//! that eventually claims the task. Its status follows
//!
//! ```text
//! Pending -> Running -> Done | Failed
//! Pending -> Cancelled
//! ```
//!
//! and every arrow is a single compare-and-swap on the status word, so a
//! `cancel()` racing with a worker's start resolves to exactly one winner.
//!
//! Cancellation only applies while a task is still `Pending`. A task that is
//! already `Running` always runs to completion: there is no way to abort the
//! callable from outside, it controls when (if ever) it returns.

use super::task::{Lifecycle, TaskId};
use crate::error::{Error, Result, TaskFailure};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Pending = 0,
    Running = 1,
    Done = 2,
    Failed = 3,
    Cancelled = 4,
}

impl Status {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Status::Pending,
            1 => Status::Running,
            2 => Status::Done,
            3 => Status::Failed,
            4 => Status::Cancelled,
            _ => unreachable!("invalid status word {}", raw),
        }
    }

    /// `Done`, `Failed` and `Cancelled` have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::Cancelled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Done => "done",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

pub(crate) struct Shared<T> {
    id: TaskId,
    status: AtomicU8,
    // Written once, by the worker, in the same critical section that
    // publishes Done/Failed.
    outcome: Mutex<Option<std::result::Result<T, TaskFailure>>>,
    changed: Condvar,
}

impl<T> Shared<T> {
    pub(crate) fn new(id: TaskId) -> Self {
        Self {
            id,
            status: AtomicU8::new(Status::Pending as u8),
            outcome: Mutex::new(None),
            changed: Condvar::new(),
        }
    }

    fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    fn transition(&self, from: Status, to: Status) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stores the outcome and publishes `Done` or `Failed`. Only the worker
    /// that won `Pending -> Running` may call this.
    pub(crate) fn complete(&self, outcome: std::result::Result<T, TaskFailure>) -> Status {
        let to = if outcome.is_ok() {
            Status::Done
        } else {
            Status::Failed
        };

        let mut slot = self.outcome.lock();
        assert!(slot.is_none(), "task {} completed twice", self.id);
        *slot = Some(outcome);
        let moved = self.transition(Status::Running, to);
        assert!(moved, "task {} completed without running", self.id);
        drop(slot);

        self.changed.notify_all();
        to
    }
}

impl<T: Send> Lifecycle for Shared<T> {
    fn try_start(&self) -> bool {
        self.transition(Status::Pending, Status::Running)
    }

    fn cancel(&self) -> bool {
        if !self.transition(Status::Pending, Status::Cancelled) {
            return false;
        }
        // Take the lock so a waiter between its status check and its park
        // cannot miss this wakeup.
        let _guard = self.outcome.lock();
        self.changed.notify_all();
        true
    }
}

/// Handle to a submitted task.
///
/// Dropping the handle does not cancel the task; the worker still runs it
/// and the outcome is freed with the last reference.
pub struct TaskFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> TaskFuture<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn status(&self) -> Status {
        self.shared.status()
    }

    /// Cancels the task if no worker has claimed it yet.
    ///
    /// Returns `false` without side effects once the task is running or
    /// finished; check [`status`](Self::status) for the real outcome.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    pub fn is_done(&self) -> bool {
        self.status() == Status::Done
    }

    pub fn is_failed(&self) -> bool {
        self.status() == Status::Failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == Status::Cancelled
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Snapshot of the outcome; `None` unless the status is `Done` or `Failed`.
    pub fn result(&self) -> Option<std::result::Result<T, TaskFailure>>
    where
        T: Clone,
    {
        self.shared.outcome.lock().clone()
    }

    pub fn failure(&self) -> Option<TaskFailure> {
        match self.shared.outcome.lock().as_ref() {
            Some(Err(failure)) => Some(failure.clone()),
            _ => None,
        }
    }

    /// Blocks until the task reaches a terminal status.
    pub fn wait(&self) -> Status {
        let mut guard = self.shared.outcome.lock();
        loop {
            let status = self.status();
            if status.is_terminal() {
                return status;
            }
            self.shared.changed.wait(&mut guard);
        }
    }

    /// Blocks for at most `timeout`. Returns `true` if the task is terminal.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.outcome.lock();
        while !self.status().is_terminal() {
            if self
                .shared
                .changed
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return self.status().is_terminal();
            }
        }
        true
    }

    /// Waits for the task and moves its value out.
    pub fn join(self) -> Result<T> {
        if self.wait() == Status::Cancelled {
            return Err(Error::Cancelled);
        }

        match self.shared.outcome.lock().take() {
            Some(Ok(value)) => Ok(value),
            Some(Err(failure)) => Err(Error::TaskFailed(failure)),
            None => unreachable!("task {} is terminal without an outcome", self.shared.id),
        }
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("id", &self.shared.id)
            .field("status", &self.shared.status())
            .finish()
    }
}
