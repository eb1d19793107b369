//! Job record and status machine.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a job, minted once at enqueue time.
///
/// The format is `{kind}_{sequence}_{YYYYMMDD_HHMMSS}` so ids stay readable
/// in the store and in result artifact file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of work kinds the queue accepts.
///
/// Design note: a closed enum (instead of a free string) makes dispatch
/// exhaustive and rejects unknown kinds at enqueue time, not mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    CodeImprovement,
    TestGeneration,
    DependencyCheck,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::CodeImprovement => "code_improvement",
            JobKind::TestGeneration => "test_generation",
            JobKind::DependencyCheck => "dependency_check",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown job kind `{0}`")]
pub struct UnknownKind(pub String);

impl FromStr for JobKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code_improvement" => Ok(JobKind::CodeImprovement),
            "test_generation" => Ok(JobKind::TestGeneration),
            "dependency_check" => Ok(JobKind::DependencyCheck),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Job status (the full lifecycle).
///
/// Transitions are monotonic: Pending -> Running -> Completed | Failed.
/// Terminal states never transition again; the record methods enforce this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown job status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Highest priority a job can be enqueued with (inclusive).
pub const MAX_PRIORITY: u8 = 10;

/// One unit of schedulable work.
///
/// Design:
/// - Identity fields (`id`, `kind`, `input_path`, `priority`, `created_at`)
///   are immutable after creation.
/// - `status` and `result` are mutated only by the queue, via the transition
///   methods below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub input_path: PathBuf,
    pub priority: u8,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub result: Option<serde_json::Value>,
}

impl JobRecord {
    pub fn new(
        id: JobId,
        kind: JobKind,
        input_path: impl Into<PathBuf>,
        priority: u8,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            input_path: input_path.into(),
            priority,
            status: JobStatus::Pending,
            created_at,
            result: None,
        }
    }

    /// Mark as running (dispatch is about to start).
    pub fn start(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
        }
    }

    /// Mark as completed with the runner's output.
    pub fn complete(&mut self, result: serde_json::Value) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
    }

    /// Mark as failed, capturing the error message as the result payload.
    pub fn fail(&mut self, error: impl fmt::Display) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.result = Some(serde_json::json!({ "error": error.to_string() }));
    }
}

/// Canonical dispatch order: priority descending, then creation time
/// ascending. A stable sort over an insertion-ordered collection keeps the
/// earliest-enqueued-first tie-break for identical timestamps.
pub fn dispatch_order(a: &JobRecord, b: &JobRecord) -> std::cmp::Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
}
