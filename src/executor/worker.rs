// worker thread loop
use super::panic_handler::PanicHandler;
use super::queue::{Message, TaskQueue};
use crate::telemetry::Metrics;

pub type WorkerId = usize;

#[derive(Debug)]
pub(crate) struct Worker {
    pub id: WorkerId,
    executed: u64,
    discarded: u64,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            executed: 0,
            discarded: 0,
        }
    }

    // main loop: runs until a stop sentinel is dequeued
    pub fn run(mut self, queue: &TaskQueue, handler: &PanicHandler, metrics: &Metrics) {
        log::debug!("worker {} started", self.id);

        loop {
            let task = match queue.pop_blocking() {
                Message::Run(task) => task,
                Message::Stop => break,
            };

            if !task.try_start() {
                log::trace!("worker {} discarding cancelled task {}", self.id, task.id);
                self.discarded += 1;
                metrics.record_discarded(1);
                continue;
            }

            let id = task.id;
            metrics.record_started(task.spawn_time.elapsed());
            log::trace!("worker {} running task {}", self.id, id);

            let status = task.execute(handler, metrics);
            self.executed += 1;

            log::trace!("worker {} finished task {}: {}", self.id, id, status);
        }

        log::debug!(
            "worker {} exiting; executed={} discarded={}",
            self.id,
            self.executed,
            self.discarded
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskFailure;
    use crate::executor::PanicStrategy;

    #[test]
    fn test_worker_drains_until_stop() {
        let queue = TaskQueue::new();
        let handler = PanicHandler::new(PanicStrategy::Isolate);
        let metrics = Metrics::new();

        let ok_future = queue.push(|| Ok::<_, TaskFailure>("rows"));
        let bad_future = queue.push(|| -> Result<&'static str, TaskFailure> { panic!("bad") });
        let skipped_future = queue.push(|| Ok::<_, TaskFailure>("never"));
        let after_future = queue.push(|| Ok::<_, TaskFailure>("after"));
        queue.push_stop(1);

        skipped_future.cancel();
        Worker::new(0).run(&queue, &handler, &metrics);

        assert_eq!(ok_future.join().unwrap(), "rows");
        assert!(bad_future.is_failed());
        assert!(skipped_future.is_cancelled());
        assert_eq!(after_future.join().unwrap(), "after");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_done, 2);
        assert_eq!(snapshot.tasks_failed, 1);
        assert_eq!(snapshot.tasks_discarded, 1);
        assert_eq!(snapshot.cancelled_total(), 1);
    }
}
