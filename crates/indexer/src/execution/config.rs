use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SETTINGS_FILE_NAME: &str = "phpkg.settings.json";

/// Settings of a workspace indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub worker_threads: usize,
    pub max_file_size: u64,
    pub respect_gitignore: bool,
    /// File extensions (without the dot) treated as PHP sources.
    pub extensions: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        IndexingConfigBuilder::build(0)
    }
}

impl IndexingConfig {
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(extension))
    }
}

pub struct IndexingConfigBuilder;

impl IndexingConfigBuilder {
    pub fn build(threads: usize) -> IndexingConfig {
        let effective_threads = IndexingConfigBuilder::get_effective_threads(threads);
        IndexingConfig {
            worker_threads: effective_threads,
            max_file_size: 5_000_000,
            respect_gitignore: true,
            extensions: vec!["php".to_string()],
        }
    }

    pub fn get_effective_threads(threads: usize) -> usize {
        if threads == 0 {
            num_cpus::get()
        } else {
            threads
        }
    }
}

/// Reads the settings file at `path`. A missing or malformed file yields
/// the default configuration.
pub fn read_indexing_configuration(path: &Path) -> IndexingConfig {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                "Could not read indexing configuration {}: {}. Returning default configuration.",
                path.display(),
                e
            );
            return IndexingConfig::default();
        }
    };

    let mut configuration: IndexingConfig = match serde_json::from_str(&content) {
        Ok(configuration) => configuration,
        Err(e) => {
            warn!(
                "Could not parse indexing configuration {}: {}. Returning default configuration.",
                path.display(),
                e
            );
            return IndexingConfig::default();
        }
    };

    configuration.worker_threads =
        IndexingConfigBuilder::get_effective_threads(configuration.worker_threads);
    configuration
}
