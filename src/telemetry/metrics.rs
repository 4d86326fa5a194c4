//! Metrics collection for pool monitoring.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// One hour in nanoseconds; longer samples saturate.
const MAX_TRACKED_NS: u64 = 3_600_000_000_000;

/// Executor-wide counters, updated by the submitting side and the workers.
#[derive(Debug)]
pub struct Metrics {
    tasks_submitted: AtomicU64,
    tasks_rejected: AtomicU64,
    tasks_done: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_cancelled: AtomicU64,
    tasks_discarded: AtomicU64,

    run_time: RwLock<Histogram<u64>>,
    queue_wait: RwLock<Histogram<u64>>,

    start_time: Instant,
}

fn histogram() -> Histogram<u64> {
    Histogram::new_with_max(MAX_TRACKED_NS, 3).expect("static histogram bounds are valid")
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            tasks_done: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_cancelled: AtomicU64::new(0),
            tasks_discarded: AtomicU64::new(0),
            run_time: RwLock::new(histogram()),
            queue_wait: RwLock::new(histogram()),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks cancelled in bulk by `terminate`.
    pub fn record_cancelled(&self, count: usize) {
        self.tasks_cancelled
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Caller-cancelled tasks removed from the queue, by a worker or by
    /// `terminate`.
    pub fn record_discarded(&self, count: usize) {
        self.tasks_discarded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_started(&self, waited: Duration) {
        self.queue_wait.write().saturating_record(nanos(waited));
    }

    pub fn record_finished(&self, ok: bool, ran: Duration) {
        if ok {
            self.tasks_done.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.run_time.write().saturating_record(nanos(ran));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let run_time = self.run_time.read();
        let queue_wait = self.queue_wait.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            tasks_done: self.tasks_done.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            tasks_discarded: self.tasks_discarded.load(Ordering::Relaxed),
            avg_run_ns: if run_time.len() > 0 {
                run_time.mean() as u64
            } else {
                0
            },
            p99_run_ns: run_time.value_at_quantile(0.99),
            max_run_ns: run_time.max(),
            p99_queue_wait_ns: queue_wait.value_at_quantile(0.99),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
///
/// A task's `done`/`failed` count is visible before its future turns
/// terminal, so a snapshot taken after `join()` includes it.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub tasks_submitted: u64,
    /// Submissions refused after shutdown.
    pub tasks_rejected: u64,
    pub tasks_done: u64,
    pub tasks_failed: u64,
    /// Tasks cancelled by `terminate`.
    pub tasks_cancelled: u64,
    /// Tasks cancelled through `TaskFuture::cancel`, counted once they leave
    /// the queue (a worker skipped them or `terminate` drained them). A
    /// cancelled task still sitting in the queue is not counted yet.
    pub tasks_discarded: u64,
    pub avg_run_ns: u64,
    pub p99_run_ns: u64,
    pub max_run_ns: u64,
    pub p99_queue_wait_ns: u64,
}

impl MetricsSnapshot {
    /// Tasks a worker ran to a terminal status.
    pub fn completed(&self) -> u64 {
        self.tasks_done + self.tasks_failed
    }

    /// Tasks cancelled either way and already removed from the queue.
    pub fn cancelled_total(&self) -> u64 {
        self.tasks_cancelled + self.tasks_discarded
    }

    pub fn mean_run_time(&self) -> Duration {
        Duration::from_nanos(self.avg_run_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_started(Duration::from_micros(5));
        metrics.record_finished(true, Duration::from_micros(1));
        metrics.record_finished(false, Duration::from_micros(3));
        metrics.record_discarded(1);
        metrics.record_cancelled(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_submitted, 2);
        assert_eq!(snapshot.tasks_done, 1);
        assert_eq!(snapshot.tasks_failed, 1);
        assert_eq!(snapshot.completed(), 2);
        assert_eq!(snapshot.tasks_cancelled, 4);
        assert_eq!(snapshot.tasks_discarded, 1);
        assert_eq!(snapshot.cancelled_total(), 5);
        assert!(snapshot.avg_run_ns > 0);
        assert!(snapshot.p99_queue_wait_ns > 0);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.completed(), 0);
        assert_eq!(snapshot.mean_run_time(), Duration::ZERO);
    }
}
