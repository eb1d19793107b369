//! Job runner port and the kind -> runner registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::JobKind;
use crate::error::RunnerError;

/// Executes one job: turns a kind + input path into an opaque result payload
/// or a failure.
///
/// Implementations must be safe to invoke concurrently for distinct jobs;
/// the queue dispatches up to a whole batch at once against the same runner.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn execute(
        &self,
        kind: JobKind,
        input_path: &Path,
    ) -> Result<serde_json::Value, RunnerError>;
}

#[derive(Debug, Error)]
#[error("runner already registered for kind {0}")]
pub struct DuplicateRunner(pub JobKind);

/// Registry of runners (kind -> runner).
///
/// Design:
/// - Built during initialization (mutable).
/// - Used during runtime (immutable).
/// This avoids locks and keeps dispatch a plain map lookup.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: HashMap<JobKind, Arc<dyn JobRunner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
        }
    }

    /// Register a runner for a kind. Exactly one runner per kind.
    pub fn register(
        &mut self,
        kind: JobKind,
        runner: Arc<dyn JobRunner>,
    ) -> Result<(), DuplicateRunner> {
        if self.runners.contains_key(&kind) {
            return Err(DuplicateRunner(kind));
        }
        self.runners.insert(kind, runner);
        Ok(())
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobRunner>> {
        self.runners.get(&kind).cloned()
    }

    pub fn contains(&self, kind: JobKind) -> bool {
        self.runners.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}
