//! Progress reporter: observes batch completion, owns no scheduling
//! decisions.

use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{JobReport, JobStatus, RunSummary};

/// Tracks per-file outcomes against a total known at construction and emits
/// a progress line per settled job.
pub struct ProgressReporter {
    total: usize,
    reports: BTreeMap<String, JobReport>,
}

impl ProgressReporter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            reports: BTreeMap::new(),
        }
    }

    pub fn update(&mut self, input_path: &Path, status: JobStatus, message: &str) {
        self.reports.insert(
            input_path.to_string_lossy().into_owned(),
            JobReport {
                status,
                message: message.to_string(),
            },
        );
        tracing::info!(
            done = self.reports.len(),
            total = self.total,
            path = %input_path.display(),
            %status,
            "processed"
        );
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total: self.reports.len(),
            successful: self
                .reports
                .values()
                .filter(|r| r.status == JobStatus::Completed)
                .count(),
            failed: self
                .reports
                .values()
                .filter(|r| r.status == JobStatus::Failed)
                .count(),
            reports: self.reports.clone(),
        }
    }
}
