use super::future::TaskFuture;
use super::task::{Task, TaskId};
use crate::error::TaskFailure;
use crate::telemetry::Metrics;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// What a worker receives from [`TaskQueue::pop_blocking`].
#[derive(Debug)]
pub(crate) enum Message {
    Run(Task),
    /// Exit the worker loop. One is queued per worker on shutdown, behind
    /// everything already submitted.
    Stop,
}

#[derive(Debug, Default)]
struct State {
    items: VecDeque<Message>,
    next_id: u64,
}

/// Unbounded FIFO shared by the submitting side and every worker.
///
/// A single mutex serializes `push`, `pop_blocking` and `drain_cancel_all`,
/// so an item is either handed to exactly one worker or cancelled. Ids are
/// taken under the same lock, so id order is dispatch order.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next id to `f`, appends it and returns its `Pending` future.
    pub fn push<F, T>(&self, f: F) -> TaskFuture<T>
    where
        F: FnOnce() -> Result<T, TaskFailure> + Send + 'static,
        T: Send + 'static,
    {
        let mut state = self.state.lock();
        let id = TaskId::new(state.next_id);
        state.next_id += 1;
        let (task, future) = Task::new(id, f);
        state.items.push_back(Message::Run(task));
        drop(state);

        self.available.notify_one();
        future
    }

    pub fn push_stop(&self, count: usize) {
        let mut state = self.state.lock();
        state.items.extend((0..count).map(|_| Message::Stop));
        drop(state);
        self.available.notify_all();
    }

    /// Removes the head, parking the caller while the queue is empty.
    pub fn pop_blocking(&self) -> Message {
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.items.pop_front() {
                return message;
            }
            self.available.wait(&mut state);
        }
    }

    /// Removes every queued task, marks its future `Cancelled` and returns how
    /// many were removed. Stop sentinels stay where they are.
    ///
    /// Tasks this call cancels count as `cancelled`; tasks the caller had
    /// already cancelled count as `discarded`.
    pub fn drain_cancel_all(&self, metrics: &Metrics) -> usize {
        let mut state = self.state.lock();
        let mut drained = Vec::with_capacity(state.items.len());
        let mut kept = VecDeque::new();
        let mut cancelled = 0;

        for message in state.items.drain(..) {
            match message {
                Message::Run(task) => {
                    if task.cancel() {
                        cancelled += 1;
                    }
                    drained.push(task);
                }
                Message::Stop => kept.push_back(Message::Stop),
            }
        }
        state.items = kept;
        drop(state);

        let count = drained.len();
        metrics.record_cancelled(cancelled);
        metrics.record_discarded(count - cancelled);

        // Closures are dropped outside the lock; their captures may run
        // arbitrary destructors.
        drop(drained);
        count
    }

    /// Number of queued tasks, excluding stop sentinels.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .items
            .iter()
            .filter(|m| matches!(m, Message::Run(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn push_value(queue: &TaskQueue, value: u64) -> TaskFuture<u64> {
        queue.push(move || Ok::<_, TaskFailure>(value))
    }

    fn expect_run(message: Message) -> Task {
        match message {
            Message::Run(task) => task,
            Message::Stop => panic!("expected a task, got stop"),
        }
    }

    #[test]
    fn test_fifo_order_matches_ids() {
        let queue = TaskQueue::new();
        let futures: Vec<_> = (0..3).map(|v| push_value(&queue, v)).collect();

        assert_eq!(queue.len(), 3);
        for (expected, future) in futures.iter().enumerate() {
            assert_eq!(future.id().as_u64(), expected as u64);
            assert_eq!(expect_run(queue.pop_blocking()).id, future.id());
        }
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_stop_after_queued_work() {
        let queue = TaskQueue::new();
        let _future = push_value(&queue, 0);
        queue.push_stop(1);

        assert!(matches!(queue.pop_blocking(), Message::Run(_)));
        assert!(matches!(queue.pop_blocking(), Message::Stop));
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(TaskQueue::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || expect_run(queue.pop_blocking()).id.as_u64())
        };

        thread::sleep(Duration::from_millis(20));
        let future = push_value(&queue, 42);

        assert_eq!(consumer.join().unwrap(), future.id().as_u64());
    }

    #[test]
    fn test_drain_cancels_tasks_and_keeps_stops() {
        let queue = TaskQueue::new();
        let metrics = Metrics::new();
        let fa = push_value(&queue, 0);
        queue.push_stop(2);
        let fb = push_value(&queue, 1);
        fb.cancel();

        assert_eq!(queue.drain_cancel_all(&metrics), 2);
        assert!(fa.is_cancelled());
        assert!(fb.is_cancelled());
        assert_eq!(queue.len(), 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_cancelled, 1);
        assert_eq!(snapshot.tasks_discarded, 1);
        assert_eq!(snapshot.cancelled_total(), 2);

        assert!(matches!(queue.pop_blocking(), Message::Stop));
        assert!(matches!(queue.pop_blocking(), Message::Stop));
    }

    #[test]
    fn test_ids_follow_queue_order_across_producers() {
        let queue = Arc::new(TaskQueue::new());

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    (0..250)
                        .map(|v| push_value(&queue, v))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let futures: Vec<_> = producers
            .into_iter()
            .flat_map(|p| p.join().unwrap())
            .collect();

        for expected in 0..1000u64 {
            assert_eq!(expect_run(queue.pop_blocking()).id.as_u64(), expected);
        }
        assert_eq!(futures.len(), 1000);
    }
}
