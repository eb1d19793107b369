//! refit-core
//!
//! Scheduling and execution of code-improvement jobs.
//!
//! # Module layout
//! - **domain**: job identity, lifecycle, and run summaries
//! - **ports**: trait seams (job runners, the completion service, time)
//! - **store**: durable job persistence (SQLite)
//! - **queue**: in-memory priority queue + batched execution loop
//! - **watcher**: filesystem-change trigger feeding the queue
//! - **sink** / **progress**: result artifacts and run observation
//! - **runners**: stock runner per job kind
//! - **config** / **error**: configuration and the error taxonomy

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod progress;
pub mod queue;
pub mod runners;
pub mod sink;
pub mod store;
pub mod watcher;

pub use config::QueueConfig;
pub use domain::{JobId, JobKind, JobRecord, JobStatus, RunSummary};
pub use error::{EnqueueError, RunnerError, SinkError, StorageError, WatchError};
pub use ports::{Clock, CompletionClient, JobRunner, RunnerRegistry, SystemClock};
pub use queue::{DEFAULT_BATCH_SIZE, JobQueue};
pub use sink::ResultSink;
pub use store::{JobStore, SqliteJobStore};
pub use watcher::{WATCH_PRIORITY, WatchHandle, watch};
