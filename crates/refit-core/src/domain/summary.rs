//! Run summary: what a finished `run()` reports back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::job::JobStatus;

/// Per-file outcome line, keyed by input path in [`RunSummary::reports`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub status: JobStatus,
    pub message: String,
}

/// Aggregate of one `run()` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub reports: BTreeMap<String, JobReport>,
}
