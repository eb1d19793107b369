//! SQLite implementation of the job store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};

use crate::domain::{JobId, JobRecord};
use crate::error::StorageError;

use super::JobStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        input_path TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        result TEXT,
        priority INTEGER NOT NULL DEFAULT 0
    )
";

/// Job store backed by a single local SQLite database.
///
/// The connection sits behind a mutex: writes are short and local, and the
/// queue is the only writer within a process.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (creating the file and parent directory if needed) and ensure
    /// the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// In-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn map_row(row: &Row<'_>) -> Result<JobRecord, StorageError> {
        let id: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let input_path: String = row.get(2)?;
        let status: String = row.get(3)?;
        let created_at: String = row.get(4)?;
        let result: Option<String> = row.get(5)?;
        let priority: i64 = row.get(6)?;

        Ok(JobRecord {
            id: JobId::new(id),
            kind: kind
                .parse()
                .map_err(|e| StorageError::Corrupt(format!("{e}")))?,
            input_path: input_path.into(),
            status: status
                .parse()
                .map_err(|e| StorageError::Corrupt(format!("{e}")))?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| StorageError::Corrupt(format!("created_at `{created_at}`: {e}")))?
                .with_timezone(&Utc),
            priority: u8::try_from(priority)
                .map_err(|_| StorageError::Corrupt(format!("priority {priority}")))?,
            result: result
                .map(|text| serde_json::from_str(&text))
                .transpose()
                .map_err(|e| StorageError::Corrupt(format!("result payload: {e}")))?,
        })
    }

    /// Fixed-width timestamp so the SQL `ORDER BY created_at` is a correct
    /// lexicographic order.
    fn encode_timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Fetch one row by id (for tests).
    #[cfg(test)]
    pub fn get(&self, id: &JobId) -> Result<Option<JobRecord>, StorageError> {
        use rusqlite::OptionalExtension;

        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT id, kind, input_path, status, created_at, result, priority
             FROM jobs WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(Self::map_row(row))
            },
        )
        .optional()?
        .transpose()
    }
}

impl JobStore for SqliteJobStore {
    fn initialize(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(SCHEMA, [])?;
        Ok(())
    }

    fn save(&self, job: &JobRecord) -> Result<(), StorageError> {
        // Serialize to a staging buffer first: a serialization failure must
        // leave the existing row untouched.
        let result_text = job
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(StorageError::Serialize)?;

        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO jobs
             (id, kind, input_path, status, created_at, result, priority)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                job.id.as_str(),
                job.kind.as_str(),
                job.input_path.to_string_lossy().into_owned(),
                job.status.as_str(),
                Self::encode_timestamp(job.created_at),
                result_text,
                i64::from(job.priority),
            ],
        )?;
        Ok(())
    }

    fn pending(&self) -> Result<Vec<JobRecord>, StorageError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, kind, input_path, status, created_at, result, priority
             FROM jobs
             WHERE status = 'pending'
             ORDER BY priority DESC, created_at ASC",
        )?;
        let rows = stmt.query_and_then([], Self::map_row)?;
        rows.collect()
    }
}
