//! Queue configuration.

use std::env;
use std::path::PathBuf;

use crate::queue::DEFAULT_BATCH_SIZE;

/// Paths and knobs for one queue instance.
///
/// Defaults match the original deployment layout: a local database under
/// `data/`, artifacts under `results/`, three jobs per batch, Python files
/// under watch.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub db_path: PathBuf,
    pub results_dir: PathBuf,
    pub batch_size: usize,
    pub watch_extension: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/jobs.db"),
            results_dir: PathBuf::from("results"),
            batch_size: DEFAULT_BATCH_SIZE,
            watch_extension: "py".to_string(),
        }
    }
}

impl QueueConfig {
    /// Build from `REFIT_*` environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_path: env::var("REFIT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            results_dir: env::var("REFIT_RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            batch_size: env::var("REFIT_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            watch_extension: env::var("REFIT_WATCH_EXT").unwrap_or(defaults.watch_extension),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stock_layout() {
        let config = QueueConfig::default();
        assert_eq!(config.db_path, PathBuf::from("data/jobs.db"));
        assert_eq!(config.results_dir, PathBuf::from("results"));
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.watch_extension, "py");
    }
}
