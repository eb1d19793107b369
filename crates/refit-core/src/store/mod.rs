//! Durable job store: persistence that survives process restarts.

mod sqlite;

pub use sqlite::SqliteJobStore;

use crate::domain::JobRecord;
use crate::error::StorageError;

/// Store port (interface).
///
/// The default implementation is SQLite, but this trait is the seam for
/// swapping implementations (and for failure injection in tests).
pub trait JobStore: Send + Sync {
    /// Idempotently ensure the persistence medium and schema exist.
    /// Safe to call on every process start.
    fn initialize(&self) -> Result<(), StorageError>;

    /// Insert-or-replace by id. Re-saving an id overwrites, never duplicates.
    fn save(&self, job: &JobRecord) -> Result<(), StorageError>;

    /// All PENDING records in canonical dispatch order: priority descending,
    /// then creation time ascending. Any reload of queued work reproduces
    /// this order.
    fn pending(&self) -> Result<Vec<JobRecord>, StorageError>;
}
