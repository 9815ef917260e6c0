pub mod diagnostics;
pub mod index;
pub mod query;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use database::SymbolStore;
use indexer::analysis::php::Document;
use indexer::execution::config::{
    IndexingConfig, IndexingConfigBuilder, SETTINGS_FILE_NAME, read_indexing_configuration,
};
use indexer::runner::run_workspace_indexer;
use tracing::debug;

use crate::cli::IndexArgs;

/// Settings file first, then command line overrides.
pub fn load_config(workspace_path: &Path, args: &IndexArgs) -> IndexingConfig {
    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(|| workspace_path.join(SETTINGS_FILE_NAME));

    let mut config = if args.config.is_some() || settings_path.exists() {
        read_indexing_configuration(&settings_path)
    } else {
        IndexingConfigBuilder::build(0)
    };
    if args.threads > 0 {
        config.worker_threads = IndexingConfigBuilder::get_effective_threads(args.threads);
    }
    debug!("Effective indexing configuration: {config:?}");
    config
}

/// Indexes the workspace quietly into a fresh in-memory store.
pub fn index_quietly(workspace_path: &Path, args: &IndexArgs) -> Result<SymbolStore> {
    let store = SymbolStore::in_memory();
    let config = load_config(workspace_path, args);
    run_workspace_indexer(store.clone(), workspace_path, config, |_| {})?;
    Ok(store)
}

pub fn resolve_file(workspace_path: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        workspace_path.join(file)
    }
}

pub fn load_document(path: &Path) -> Result<Document> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Document::parse(path.to_string_lossy(), text)
        .with_context(|| format!("Failed to parse {}", path.display()))
}
