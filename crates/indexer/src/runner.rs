use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use database::SymbolStore;
use tracing::{Level, error, info, warn};

use crate::execution::config::IndexingConfig;
use crate::execution::executor::{IndexingResult, WorkspaceIndexer};
use crate::project::source::PathFileSource;

fn progress_with_tracing<F>(message: &str, progress: &mut F, level: Level)
where
    F: FnMut(&str),
{
    progress(message);
    match level {
        Level::INFO => info!("{message}"),
        Level::WARN => warn!("{message}"),
        Level::ERROR => error!("{message}"),
        _ => info!("{message}"),
    }
}

/// Indexes every PHP file under `workspace_path` into `store`, reporting
/// human readable progress through `progress`.
pub fn run_workspace_indexer<F>(
    store: SymbolStore,
    workspace_path: &Path,
    config: IndexingConfig,
    mut progress: F,
) -> Result<IndexingResult>
where
    F: FnMut(&str),
{
    let start_time = Instant::now();
    progress_with_tracing("🚀 Starting PHP symbol indexing...", &mut progress, Level::INFO);
    progress_with_tracing(
        &format!("📂 Workspace: {}", workspace_path.display()),
        &mut progress,
        Level::INFO,
    );

    progress_with_tracing("⚙️ Indexing configuration:", &mut progress, Level::INFO);
    progress_with_tracing(
        &format!("  • Worker threads: {}", config.worker_threads),
        &mut progress,
        Level::INFO,
    );
    progress_with_tracing(
        &format!("  • Max file size: {} MB", config.max_file_size / 1_000_000),
        &mut progress,
        Level::INFO,
    );
    progress_with_tracing(
        &format!("  • Respect .gitignore: {}", config.respect_gitignore),
        &mut progress,
        Level::INFO,
    );
    progress_with_tracing(
        &format!("  • Extensions: {}", config.extensions.join(", ")),
        &mut progress,
        Level::INFO,
    );

    let indexer = WorkspaceIndexer::new(store, config);
    let source = PathFileSource::new(workspace_path.to_path_buf());
    let result = indexer
        .index_source(&source)
        .with_context(|| format!("Failed to index workspace {}", workspace_path.display()))?;

    if result.total_files == 0 {
        progress_with_tracing(
            "ℹ️ No PHP files found in workspace",
            &mut progress,
            Level::INFO,
        );
        return Ok(result);
    }

    let total_time = start_time.elapsed();
    progress_with_tracing(
        &format!("\n🎉 Indexing completed in {total_time:?}"),
        &mut progress,
        Level::INFO,
    );
    progress_with_tracing("📊 Summary:", &mut progress, Level::INFO);
    progress_with_tracing(
        &format!("  • Files processed: {}", result.processed_files),
        &mut progress,
        Level::INFO,
    );
    progress_with_tracing(
        &format!("  • Files skipped: {}", result.skipped_files.len()),
        &mut progress,
        Level::INFO,
    );
    progress_with_tracing(
        &format!("  • Files with errors: {}", result.errored_files.len()),
        &mut progress,
        Level::INFO,
    );
    progress_with_tracing(
        &format!("  • Declarations: {}", result.declarations_count),
        &mut progress,
        Level::INFO,
    );
    if result.syntax_errors > 0 {
        progress_with_tracing(
            &format!("  • Syntax errors: {}", result.syntax_errors),
            &mut progress,
            Level::WARN,
        );
    }

    if result.processed_files > 0 {
        let files_per_sec = result.processed_files as f64 / total_time.as_secs_f64();
        progress_with_tracing(
            &format!("  • Processing rate: {files_per_sec:.1} files/second"),
            &mut progress,
            Level::INFO,
        );
    }

    let errors = result.error_messages();
    if !errors.is_empty() {
        progress_with_tracing(
            &format!("  ⚠️ Errors encountered ({} total):", errors.len()),
            &mut progress,
            Level::WARN,
        );
        for message in errors.iter().take(10) {
            progress_with_tracing(&format!("    • {message}"), &mut progress, Level::WARN);
        }
        if errors.len() > 10 {
            progress_with_tracing(
                &format!("    • ... and {} more errors", errors.len() - 10),
                &mut progress,
                Level::WARN,
            );
        }
    }

    Ok(result)
}
