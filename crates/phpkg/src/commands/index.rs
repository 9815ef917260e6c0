use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use database::SymbolStore;
use indexer::execution::executor::IndexingResult;
use indexer::runner::run_workspace_indexer;
use tracing::{error, info};

use super::load_config;
use crate::cli::IndexArgs;

fn export_statistics(result: &IndexingResult, stats_path: &PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    fs::write(stats_path, json)
        .with_context(|| format!("Failed to write {}", stats_path.display()))?;
    Ok(())
}

pub fn run(workspace_path: PathBuf, args: &IndexArgs, stats: Option<PathBuf>) -> Result<()> {
    let config = load_config(&workspace_path, args);
    let result = run_workspace_indexer(
        SymbolStore::in_memory(),
        &workspace_path,
        config,
        |message| println!("{message}"),
    )?;

    if let Some(stats_path) = stats {
        match export_statistics(&result, &stats_path) {
            Ok(()) => info!("Statistics saved to: {}", stats_path.display()),
            Err(e) => error!("Failed to save statistics: {e}"),
        }
    }
    Ok(())
}
