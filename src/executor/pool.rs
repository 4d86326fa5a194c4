use super::future::TaskFuture;
use super::panic_handler::PanicHandler;
use super::queue::TaskQueue;
use super::worker::{Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result, TaskFailure};
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::{Condvar, Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Fixed-size pool of worker threads fed from one FIFO queue.
///
/// `submit` never blocks and never runs the task on the calling thread.
/// Dropping the executor performs a graceful [`shutdown`](Self::shutdown).
///
/// Calling `shutdown` from inside a task running on the same executor
/// deadlocks: the worker would wait for itself to exit.
pub struct Executor {
    workers: Mutex<Vec<WorkerHandle>>,
    queue: Arc<TaskQueue>,
    // Held shared by `submit` across check-and-push, exclusively by shutdown
    // while it flips the flag and queues the stop sentinels.
    shutdown: RwLock<bool>,
    num_threads: usize,
    live: Arc<LiveWorkers>,
    panic_handler: Arc<PanicHandler>,
    metrics: Arc<Metrics>,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct LiveWorkers {
    count: Mutex<usize>,
    exited: Condvar,
}

/// Decrements the live count when a worker thread ends, or when its closure
/// is dropped because the spawn failed.
struct ExitGuard(Arc<LiveWorkers>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.exited.notify_all();
        }
    }
}

impl Executor {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let mut executor = Self {
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            queue: Arc::new(TaskQueue::new()),
            shutdown: RwLock::new(false),
            num_threads,
            live: Arc::new(LiveWorkers::default()),
            panic_handler: Arc::new(PanicHandler::new(config.panic_strategy)),
            metrics: Arc::new(Metrics::new()),
        };

        for id in 0..num_threads {
            if let Err(e) = executor.spawn_worker(id, &config) {
                // Stop whatever already started before reporting.
                executor.num_threads = id;
                executor.shutdown();
                return Err(e);
            }
        }

        log::info!(
            "executor started with {} worker(s) ({}-*)",
            num_threads,
            config.thread_name_prefix
        );

        Ok(executor)
    }

    /// Pool with exactly `n` workers and default settings otherwise.
    pub fn with_threads(n: usize) -> Result<Self> {
        Self::new(Config::builder().num_threads(n).build()?)
    }

    /// Pool sized by [`Config::worker_threads`]'s hardware heuristic.
    pub fn with_default_threads() -> Result<Self> {
        Self::new(Config::default())
    }

    fn spawn_worker(&self, id: WorkerId, config: &Config) -> Result<()> {
        let queue = self.queue.clone();
        let handler = self.panic_handler.clone();
        let metrics = self.metrics.clone();

        *self.live.count.lock() += 1;
        let guard = ExitGuard(self.live.clone());

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread = builder
            .spawn(move || {
                let _guard = guard;
                Worker::new(id).run(&queue, &handler, &metrics);
            })
            .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

        self.workers.lock().push(WorkerHandle {
            id,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Queues `f` and returns its handle immediately.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskFuture<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.dispatch(move || Ok(f()))
    }

    /// Queues `f(args)`; the arguments are moved into the task at submission.
    pub fn submit_with_args<F, A, T>(&self, f: F, args: A) -> Result<TaskFuture<T>>
    where
        F: FnOnce(A) -> T + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
    {
        self.dispatch(move || Ok(f(args)))
    }

    /// Queues a fallible task. `Err(e)` completes the future as `Failed`
    /// with `e`'s `Display` text.
    pub fn try_submit<F, T, E>(&self, f: F) -> Result<TaskFuture<T>>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display,
    {
        self.dispatch(move || f().map_err(|e| TaskFailure::returned(e.to_string())))
    }

    fn dispatch<F, T>(&self, f: F) -> Result<TaskFuture<T>>
    where
        F: FnOnce() -> std::result::Result<T, TaskFailure> + Send + 'static,
        T: Send + 'static,
    {
        let shutdown = self.shutdown.read();
        if *shutdown {
            self.metrics.record_rejected();
            return Err(Error::ShutDown);
        }

        let future = self.queue.push(f);
        drop(shutdown);

        self.metrics.record_submitted();
        log::trace!("submitted task {}", future.id());

        Ok(future)
    }

    /// Stops accepting work, lets every queued task run, then waits for all
    /// workers to exit. Safe to call from several threads; each returns once
    /// the pool is drained.
    pub fn shutdown(&self) {
        self.request_shutdown();

        let mut count = self.live.count.lock();
        while *count > 0 {
            self.live.exited.wait(&mut count);
        }
        drop(count);

        self.join_workers();
    }

    /// Like [`shutdown`](Self::shutdown) but gives up after `timeout`.
    ///
    /// On timeout the pool keeps draining in the background and
    /// `Error::ShutdownTimeout` reports how many workers are still live.
    pub fn shutdown_timeout(&self, timeout: Duration) -> Result<()> {
        self.request_shutdown();

        let deadline = Instant::now() + timeout;
        let mut count = self.live.count.lock();
        while *count > 0 {
            if self.live.exited.wait_until(&mut count, deadline).timed_out() && *count > 0 {
                return Err(Error::ShutdownTimeout {
                    waited: timeout,
                    live_workers: *count,
                });
            }
        }
        drop(count);

        self.join_workers();
        Ok(())
    }

    fn request_shutdown(&self) {
        let mut shutdown = self.shutdown.write();
        if *shutdown {
            return;
        }
        *shutdown = true;
        // Sentinels land behind every task accepted so far.
        self.queue.push_stop(self.num_threads);
        drop(shutdown);

        log::debug!(
            "shutdown requested; {} task(s) still queued",
            self.queue.len()
        );
    }

    fn join_workers(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for mut worker in workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    log::error!("worker {} thread panicked outside a task", worker.id);
                }
            }
        }
    }

    /// Cancels every task no worker has claimed yet and returns how many were
    /// removed. Running tasks are not interrupted and submission stays open.
    pub fn terminate(&self) -> usize {
        let removed = self.queue.drain_cancel_all(&self.metrics);
        log::info!("terminate cancelled {} queued task(s)", removed);
        removed
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.read()
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Tasks queued but not yet claimed by a worker.
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    pub fn panic_count(&self) -> usize {
        self.panic_handler.panic_count()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("num_threads", &self.num_threads)
            .field("pending_tasks", &self.pending_tasks())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{PanicStrategy, Status};
    use std::sync::mpsc;

    fn quiet_pool(n: usize) -> Executor {
        let config = Config::builder()
            .num_threads(n)
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        Executor::new(config).unwrap()
    }

    #[test]
    fn test_submit_and_join() {
        let pool = quiet_pool(2);
        let future = pool.submit(|| 6 * 7).unwrap();
        assert_eq!(future.join().unwrap(), 42);
    }

    #[test]
    fn test_ids_increase() {
        let pool = quiet_pool(1);
        let a = pool.submit(|| ()).unwrap();
        let b = pool.submit(|| ()).unwrap();
        assert_eq!(a.id().as_u64(), 0);
        assert_eq!(b.id().as_u64(), 1);
    }

    #[test]
    fn test_submit_with_args() {
        let pool = quiet_pool(1);
        let future = pool
            .submit_with_args(|(a, b): (u32, u32)| a + b, (2, 3))
            .unwrap();
        assert_eq!(future.join().unwrap(), 5);
    }

    #[test]
    fn test_try_submit_err_is_failed() {
        let pool = quiet_pool(1);
        let future = pool
            .try_submit(|| "abc".parse::<u32>())
            .unwrap();

        assert_eq!(future.wait(), Status::Failed);
        let failure = future.failure().unwrap();
        assert!(!failure.is_panic());
        assert!(failure.message.contains("invalid digit"));
    }

    #[test]
    fn test_submit_after_shutdown_rejected() {
        let pool = quiet_pool(2);
        pool.shutdown();

        assert!(pool.is_shutdown());
        assert!(matches!(pool.submit(|| 1), Err(Error::ShutDown)));
        assert_eq!(pool.metrics().tasks_rejected, 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = quiet_pool(3);
        pool.shutdown();
        pool.shutdown();
        assert!(pool.shutdown_timeout(Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_shutdown_timeout_reports_live_workers() {
        let pool = quiet_pool(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();

        let blocker = pool
            .submit(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
            .unwrap();
        started_rx.recv().unwrap();

        match pool.shutdown_timeout(Duration::from_millis(20)) {
            Err(Error::ShutdownTimeout { live_workers, .. }) => assert_eq!(live_workers, 1),
            other => panic!("expected timeout, got {:?}", other),
        }

        release_tx.send(()).unwrap();
        pool.shutdown();
        assert!(blocker.is_done());
    }

    #[test]
    fn test_terminate_counts_cancelled() {
        let pool = quiet_pool(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();

        let running = pool
            .submit(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                "finished"
            })
            .unwrap();
        started_rx.recv().unwrap();

        let queued: Vec<_> = (0..3).map(|i| pool.submit(move || i).unwrap()).collect();
        assert_eq!(pool.pending_tasks(), 3);

        assert_eq!(pool.terminate(), 3);
        assert_eq!(pool.pending_tasks(), 0);
        assert!(queued.iter().all(|f| f.is_cancelled()));

        // terminate leaves the pool open
        let later = pool.submit(|| 9).unwrap();

        release_tx.send(()).unwrap();
        assert_eq!(running.join().unwrap(), "finished");
        assert_eq!(later.join().unwrap(), 9);
        assert_eq!(pool.metrics().tasks_cancelled, 3);
    }

    #[test]
    fn test_panic_counted() {
        let pool = quiet_pool(1);
        let future = pool.submit(|| -> u8 { panic!("boom") }).unwrap();
        assert_eq!(future.wait(), Status::Failed);
        assert_eq!(pool.panic_count(), 1);
    }

    #[test]
    fn test_worker_threads_named() {
        let config = Config::builder()
            .num_threads(1)
            .thread_name_prefix("ingest")
            .build()
            .unwrap();
        let pool = Executor::new(config).unwrap();

        let name = pool
            .submit(|| thread::current().name().map(str::to_string))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("ingest-0"));
    }
}
