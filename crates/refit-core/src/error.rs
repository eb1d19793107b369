//! Error taxonomy.
//!
//! One enum per failure class so callers can match on what failed instead of
//! parsing messages:
//! - [`StorageError`]: durable store I/O or serialization. Logged and
//!   retryable per save; never fatal to the run loop.
//! - [`RunnerError`]: one job's execution failed. Captured into that job's
//!   result payload, isolated from its batch siblings.
//! - [`EnqueueError`]: submission failed; surfaced synchronously to the
//!   caller of `enqueue`.
//! - [`SinkError`] / [`WatchError`]: collaborator failures, logged where
//!   they occur.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{JobId, JobKind};

/// Durable store failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialize result payload: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A job runner invocation failed.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("completion request failed: {0}")]
    Completion(String),

    #[error("no runner registered for kind {0}")]
    NotRegistered(JobKind),

    #[error("{0}")]
    Other(String),
}

/// Submission-time failure, surfaced to the caller of `enqueue`.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("priority {0} out of range (0-10)")]
    PriorityOutOfRange(u8),

    #[error("no runner registered for kind {0}")]
    NoRunner(JobKind),

    /// The record is queued in memory but the store write failed.
    /// Durability is best-effort per enqueue; the minted id is carried so
    /// the caller can still track the job.
    #[error("job {id} queued but not persisted: {source}")]
    Storage {
        id: JobId,
        #[source]
        source: StorageError,
    },
}

/// Result artifact write failure.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write result artifact: {0}")]
    Io(#[from] io::Error),

    #[error("serialize result artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Filesystem watcher failure.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Notify(#[from] notify::Error),
}
