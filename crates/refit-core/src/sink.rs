//! Result sink: one artifact file per terminal job.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;

use crate::domain::JobRecord;
use crate::error::SinkError;

/// Writes `<results_dir>/<id>_result.json` for every completed or failed
/// job. Ids are unique, so the artifact collection is append-only; an
/// already-existing artifact is never overwritten.
pub struct ResultSink {
    dir: PathBuf,
}

impl ResultSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the artifact for a terminal record, returning its path.
    pub fn write(&self, job: &JobRecord) -> Result<PathBuf, SinkError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}_result.json", job.id));

        let artifact = serde_json::json!({
            "task_id": job.id.as_str(),
            "type": job.kind.as_str(),
            "input_path": job.input_path.to_string_lossy(),
            "status": job.status.as_str(),
            "created_at": job.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            "result": job.result,
        });

        // create_new: an id is written at most once.
        let file = File::create_new(&path)?;
        serde_json::to_writer_pretty(file, &artifact)?;
        Ok(path)
    }
}
