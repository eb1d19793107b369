//! Dependency check runner: reports the import surface of a file.
//!
//! Line-based on purpose; this is a quick inventory, not a resolver.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::JobKind;
use crate::error::RunnerError;
use crate::ports::JobRunner;

use super::read_input;

pub struct DependencyCheckRunner;

impl DependencyCheckRunner {
    fn extract_imports(code: &str) -> Vec<String> {
        code.lines()
            .map(str::trim)
            .filter(|line| {
                line.starts_with("import ")
                    || line.starts_with("from ")
                    || line.starts_with("use ")
            })
            .map(|line| line.trim_end_matches(';').to_string())
            .collect()
    }
}

#[async_trait]
impl JobRunner for DependencyCheckRunner {
    async fn execute(
        &self,
        _kind: JobKind,
        input_path: &Path,
    ) -> Result<serde_json::Value, RunnerError> {
        let code = read_input(input_path)?;
        let imports = Self::extract_imports(&code);
        Ok(serde_json::json!({
            "imports": imports,
            "count": imports.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_python_and_rust_imports() {
        let code = "import os\nfrom pathlib import Path\n\ndef f():\n    pass\nuse std::fmt;\n";
        let imports = DependencyCheckRunner::extract_imports(code);
        assert_eq!(
            imports,
            ["import os", "from pathlib import Path", "use std::fmt"]
        );
    }

    #[tokio::test]
    async fn reports_import_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mod.py");
        std::fs::write(&file, "import json\nimport logging\n").unwrap();

        let payload = DependencyCheckRunner
            .execute(JobKind::DependencyCheck, &file)
            .await
            .unwrap();
        assert_eq!(payload["count"], 2);
        assert_eq!(payload["imports"][0], "import json");
    }
}
