//! A bounded worker-pool task executor.
//!
//! Producers hand closures to an [`Executor`], which runs them on a fixed set
//! of worker threads in FIFO submission order and reports each outcome
//! through a [`TaskFuture`].
//!
//! # Quick Start
//!
//! ```no_run
//! use threadpool_executor::prelude::*;
//!
//! let pool = Executor::with_threads(4)?;
//!
//! let futures: Vec<_> = (0..8)
//!     .map(|i| pool.submit(move || i * i))
//!     .collect::<Result<_>>()?;
//!
//! for future in futures {
//!     println!("{} -> {:?}", future.id(), future.join());
//! }
//!
//! // Queued work still runs; new submissions are rejected.
//! pool.shutdown();
//! # Ok::<(), threadpool_executor::Error>(())
//! ```
//!
//! # Lifecycle
//!
//! - [`Executor::shutdown`] drains: every task accepted before the call runs.
//! - [`Executor::terminate`] cancels tasks no worker has claimed yet.
//! - [`TaskFuture::cancel`] succeeds only while the task is `Pending`.
//!
//! Running tasks are never interrupted. A callable that never returns keeps
//! its worker busy forever and blocks `shutdown`.
//!
//! # Logging
//!
//! The crate emits through the [`log`] facade and installs no logger.

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, FailureKind, Result, TaskFailure};
pub use executor::{Executor, PanicStrategy, Status, TaskFuture, TaskId};
