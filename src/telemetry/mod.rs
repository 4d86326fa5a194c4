//! Pool counters and latency histograms.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
