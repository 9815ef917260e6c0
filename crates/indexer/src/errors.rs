//! Error types for the indexer

use thiserror::Error;

/// Result type alias for indexer operations
pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The grammar could not be loaded or produced no tree
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Symbol store error: {0}")]
    Store(#[from] database::StoreError),

    #[error("File discovery failed: {0}")]
    FileSource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
