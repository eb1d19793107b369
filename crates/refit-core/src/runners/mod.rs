//! Built-in job runners, one per kind.

mod deps;
mod improve;
mod test_gen;

pub use deps::DependencyCheckRunner;
pub use improve::CodeImprovementRunner;
pub use test_gen::TestGenerationRunner;

use std::sync::Arc;

use crate::domain::JobKind;
use crate::ports::{CompletionClient, RunnerRegistry};

/// Registry with the stock runner for every kind, sharing one completion
/// client.
pub fn builtin_registry(client: Arc<dyn CompletionClient>) -> RunnerRegistry {
    let mut registry = RunnerRegistry::new();
    registry
        .register(
            JobKind::CodeImprovement,
            Arc::new(CodeImprovementRunner::new(Arc::clone(&client))),
        )
        .expect("fresh registry");
    registry
        .register(
            JobKind::TestGeneration,
            Arc::new(TestGenerationRunner::new(client)),
        )
        .expect("fresh registry");
    registry
        .register(JobKind::DependencyCheck, Arc::new(DependencyCheckRunner))
        .expect("fresh registry");
    registry
}

/// Language fence tag for a prompt code block, from the file extension.
fn fence_tag(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => "python",
        Some("rs") => "rust",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        _ => "",
    }
}

fn read_input(path: &std::path::Path) -> Result<String, crate::error::RunnerError> {
    std::fs::read_to_string(path).map_err(|source| crate::error::RunnerError::Read {
        path: path.to_path_buf(),
        source,
    })
}
