use std::time::{Duration, Instant};

use serde::Serialize;

use crate::analysis::php::Document;
use crate::analysis::types::Severity;
use crate::execution::config::IndexingConfig;
use crate::project::file_info::FileInfo;

/// Represents a file that was skipped during processing
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file_path: String,
    pub reason: String,
    pub file_size: Option<u64>,
}

/// Represents a file that encountered an error during processing
#[derive(Debug, Clone, Serialize)]
pub struct ErroredFile {
    pub file_path: String,
    pub error_message: String,
    pub error_stage: ProcessingStage,
}

/// Represents the stage where processing failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingStage {
    FileSystem, // Failed to read file metadata or content
    Parsing,    // Failed to build a tree or extract symbols
    Storing,    // Failed to sync the extracted symbols
}

/// Result of processing a file that can be success, skipped, or error
#[derive(Debug)]
pub enum ProcessingResult {
    Success(FileProcessingResult),
    Skipped(SkippedFile),
    Error(ErroredFile),
}

impl ProcessingResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingResult::Success(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ProcessingResult::Skipped(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProcessingResult::Error(_))
    }

    /// Get the file path regardless of result type
    pub fn file_path(&self) -> &str {
        match self {
            ProcessingResult::Success(result) => &result.file_path,
            ProcessingResult::Skipped(skipped) => &skipped.file_path,
            ProcessingResult::Error(errored) => &errored.file_path,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub total_time: Duration,
    pub parse_time: Duration,
    pub declarations_count: usize,
    pub syntax_errors: usize,
}

#[derive(Debug)]
pub struct FileProcessingResult {
    pub file_path: String,
    pub file_size: u64,
    pub document: Document,
    pub stats: ProcessingStats,
}

#[derive(Debug, Clone)]
pub struct FileProcessor<'a> {
    pub path: String,
    pub content: &'a str,
    /// Pre-computed file extension to avoid duplicate parsing
    pub extension: String,
}

impl<'a> FileProcessor<'a> {
    pub fn new(path: String, content: &'a str) -> Self {
        let extension = std::path::Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("unknown")
            .to_string();

        Self {
            path,
            content,
            extension,
        }
    }

    pub fn from_file_info(file_info: &FileInfo, content: &'a str) -> Self {
        Self {
            path: file_info.uri(),
            content,
            extension: file_info.extension().to_string(),
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Parses the file into a [`Document`]. Syntax errors do not fail the
    /// file; they are counted and kept on the document.
    pub fn process(&self, config: &IndexingConfig) -> ProcessingResult {
        let start_time = Instant::now();

        if !config.accepts_extension(&self.extension) {
            return ProcessingResult::Skipped(SkippedFile {
                file_path: self.path.clone(),
                reason: format!("Unsupported extension: {}", self.extension),
                file_size: Some(self.size()),
            });
        }

        if self.size() > config.max_file_size {
            return ProcessingResult::Skipped(SkippedFile {
                file_path: self.path.clone(),
                reason: format!(
                    "File size {} exceeds limit of {} bytes",
                    self.size(),
                    config.max_file_size
                ),
                file_size: Some(self.size()),
            });
        }

        let parse_start = Instant::now();
        let document = match Document::parse(self.path.clone(), self.content) {
            Ok(document) => document,
            Err(e) => {
                return ProcessingResult::Error(ErroredFile {
                    file_path: self.path.clone(),
                    error_message: format!("Failed to parse: {e}"),
                    error_stage: ProcessingStage::Parsing,
                });
            }
        };
        let parse_time = parse_start.elapsed();

        let declarations_count = document.classes().len()
            + document.interfaces().len()
            + document.traits().len()
            + document.functions().len()
            + document.methods().len()
            + document.properties().len()
            + document.class_consts().len()
            + document.consts().len();
        let syntax_errors = document
            .diagnostics()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();

        ProcessingResult::Success(FileProcessingResult {
            file_path: self.path.clone(),
            file_size: self.size(),
            document,
            stats: ProcessingStats {
                total_time: start_time.elapsed(),
                parse_time,
                declarations_count,
                syntax_errors,
            },
        })
    }
}
