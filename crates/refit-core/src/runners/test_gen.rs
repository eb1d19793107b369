//! Test generation runner: asks the completion service for test suggestions.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::JobKind;
use crate::error::RunnerError;
use crate::ports::{CompletionClient, JobRunner};

use super::{fence_tag, read_input};

pub struct TestGenerationRunner {
    client: Arc<dyn CompletionClient>,
}

impl TestGenerationRunner {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRunner for TestGenerationRunner {
    async fn execute(
        &self,
        _kind: JobKind,
        input_path: &Path,
    ) -> Result<serde_json::Value, RunnerError> {
        let code = read_input(input_path)?;
        let prompt = format!(
            "Suggest unit tests for this code. Cover edge cases and error \
             paths:\n```{}\n{}\n```",
            fence_tag(input_path),
            code
        );
        self.client.complete(&prompt).await
    }
}
