//! Completion client port: the upstream improvement-generation service.
//!
//! The queue never talks to the network itself; runners submit a prompt here
//! and await a structured payload. Transport details live behind this trait.

use async_trait::async_trait;

use crate::error::RunnerError;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<serde_json::Value, RunnerError>;
}

/// Client used when no upstream service is configured.
///
/// Returns an empty improvements payload instead of failing, so the queue
/// still drains and records outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredClient;

#[async_trait]
impl CompletionClient for UnconfiguredClient {
    async fn complete(&self, _prompt: &str) -> Result<serde_json::Value, RunnerError> {
        tracing::warn!("completion service not configured, returning empty improvements");
        Ok(serde_json::json!({ "improvements": [] }))
    }
}
