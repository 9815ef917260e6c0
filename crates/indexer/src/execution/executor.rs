use std::fs;
use std::time::Instant;

use database::SymbolStore;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{IndexerError, Result};
use crate::execution::config::IndexingConfig;
use crate::parsing::processor::{
    ErroredFile, FileProcessor, ProcessingResult, ProcessingStage, SkippedFile,
};
use crate::project::file_info::FileInfo;
use crate::project::source::FileSource;

/// Aggregated outcome of one indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexingResult {
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub errored_files: Vec<ErroredFile>,
    pub declarations_count: usize,
    pub syntax_errors: usize,
    pub entries_written: usize,
    pub entries_deleted: usize,
    pub indexing_duration_seconds: f64,
}

impl IndexingResult {
    pub fn error_messages(&self) -> Vec<String> {
        self.errored_files
            .iter()
            .map(|e| format!("{}: {}", e.file_path, e.error_message))
            .collect()
    }
}

struct FileOutcome {
    result: ProcessingResult,
    written: usize,
    deleted: usize,
}

/// Parses files on a bounded worker pool and syncs each document into the
/// shared store.
pub struct WorkspaceIndexer {
    store: SymbolStore,
    config: IndexingConfig,
}

impl WorkspaceIndexer {
    pub fn new(store: SymbolStore, config: IndexingConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &SymbolStore {
        &self.store
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    pub fn index_source<S: FileSource>(&self, source: &S) -> Result<IndexingResult> {
        let files = source
            .get_files(&self.config)
            .map_err(|e| IndexerError::FileSource(e.to_string()))?;
        self.index_files(files)
    }

    pub fn index_files(&self, files: Vec<FileInfo>) -> Result<IndexingResult> {
        if self.config.extensions.is_empty() {
            return Err(IndexerError::Config(
                "no file extensions configured".to_string(),
            ));
        }

        let start_time = Instant::now();
        info!(
            "Indexing {} files with {} worker threads",
            files.len(),
            self.config.worker_threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .thread_name(|index| format!("phpkg-indexer-{index}"))
            .build()?;

        let outcomes: Vec<FileOutcome> =
            pool.install(|| files.par_iter().map(|file| self.index_file(file)).collect());

        let mut result = IndexingResult {
            total_files: files.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            result.entries_written += outcome.written;
            result.entries_deleted += outcome.deleted;
            match outcome.result {
                ProcessingResult::Success(processed) => {
                    result.processed_files += 1;
                    result.declarations_count += processed.stats.declarations_count;
                    result.syntax_errors += processed.stats.syntax_errors;
                }
                ProcessingResult::Skipped(skipped) => result.skipped_files.push(skipped),
                ProcessingResult::Error(errored) => result.errored_files.push(errored),
            }
        }
        result.indexing_duration_seconds = start_time.elapsed().as_secs_f64();

        info!(
            "Indexed {} of {} files ({} skipped, {} errored, {} declarations) in {:.2}s",
            result.processed_files,
            result.total_files,
            result.skipped_files.len(),
            result.errored_files.len(),
            result.declarations_count,
            result.indexing_duration_seconds
        );
        Ok(result)
    }

    fn index_file(&self, file: &FileInfo) -> FileOutcome {
        let path = file.uri();
        let content = match fs::read_to_string(&file.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {path}: {e}");
                return FileOutcome {
                    result: ProcessingResult::Error(ErroredFile {
                        file_path: path,
                        error_message: format!("Failed to read file: {e}"),
                        error_stage: ProcessingStage::FileSystem,
                    }),
                    written: 0,
                    deleted: 0,
                };
            }
        };

        let result = FileProcessor::from_file_info(file, &content).process(&self.config);
        let ProcessingResult::Success(processed) = result else {
            if let ProcessingResult::Skipped(skipped) = &result {
                debug!("Skipped {}: {}", skipped.file_path, skipped.reason);
            }
            return FileOutcome {
                result,
                written: 0,
                deleted: 0,
            };
        };

        match processed.document.sync(&self.store) {
            Ok(stats) => {
                debug!(
                    "Synced {} ({} written, {} deleted)",
                    processed.file_path, stats.written, stats.deleted
                );
                FileOutcome {
                    result: ProcessingResult::Success(processed),
                    written: stats.written,
                    deleted: stats.deleted,
                }
            }
            Err(e) => {
                warn!("Failed to store {}: {e}", processed.file_path);
                FileOutcome {
                    result: ProcessingResult::Error(ErroredFile {
                        file_path: processed.file_path,
                        error_message: format!("Failed to store symbols: {e}"),
                        error_stage: ProcessingStage::Storing,
                    }),
                    written: 0,
                    deleted: 0,
                }
            }
        }
    }
}

/// Removes everything `uri` contributed to the store, for deleted files.
pub fn forget_file(store: &SymbolStore, file: &FileInfo) -> Result<usize> {
    let stats = store.remove_document(&file.uri())?;
    Ok(stats.deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::config::IndexingConfigBuilder;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_index_files_reports_each_outcome() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.php");
        let notes = dir.path().join("notes.txt");
        fs::write(&good, "<?php\nclass Good {}\n").unwrap();
        fs::write(&notes, "not php").unwrap();

        let indexer =
            WorkspaceIndexer::new(SymbolStore::in_memory(), IndexingConfigBuilder::build(2));
        let result = indexer
            .index_files(vec![
                FileInfo::from_path(good),
                FileInfo::from_path(notes),
                FileInfo::from_path(dir.path().join("missing.php")),
            ])
            .unwrap();

        assert_eq!(result.total_files, 3);
        assert_eq!(result.processed_files, 1);
        assert_eq!(result.skipped_files.len(), 1);
        assert_eq!(result.errored_files.len(), 1);
        assert_eq!(result.errored_files[0].error_stage, ProcessingStage::FileSystem);
        assert_eq!(result.declarations_count, 1);
        assert!(logs_contain("Indexed 1 of 3 files"));
    }

    #[test]
    fn test_index_files_rejects_empty_extensions() {
        let mut config = IndexingConfigBuilder::build(1);
        config.extensions.clear();
        let indexer = WorkspaceIndexer::new(SymbolStore::in_memory(), config);

        let result = indexer.index_files(vec![FileInfo::from_path(PathBuf::from("/w/a.php"))]);
        assert!(matches!(result, Err(IndexerError::Config(_))));
    }

    #[test]
    fn test_forget_file_removes_declarations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.php");
        fs::write(&path, "<?php\nfunction helper() {}\n").unwrap();
        let file = FileInfo::from_path(path);

        let indexer =
            WorkspaceIndexer::new(SymbolStore::in_memory(), IndexingConfigBuilder::build(1));
        indexer.index_files(vec![file.clone()]).unwrap();
        assert!(forget_file(indexer.store(), &file).unwrap() > 0);

        let names = indexer
            .store()
            .prefix_search(database::Collection::Function, "help")
            .unwrap();
        assert!(names.is_empty());
    }
}
