//! Code improvement runner: file -> improvement prompt -> completion client.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::JobKind;
use crate::error::RunnerError;
use crate::ports::{CompletionClient, JobRunner};

use super::{fence_tag, read_input};

pub struct CodeImprovementRunner {
    client: Arc<dyn CompletionClient>,
}

impl CodeImprovementRunner {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRunner for CodeImprovementRunner {
    async fn execute(
        &self,
        _kind: JobKind,
        input_path: &Path,
    ) -> Result<serde_json::Value, RunnerError> {
        let code = read_input(input_path)?;
        let prompt = format!(
            "Improve this code:\n```{}\n{}\n```",
            fence_tag(input_path),
            code
        );
        self.client.complete(&prompt).await
    }
}
