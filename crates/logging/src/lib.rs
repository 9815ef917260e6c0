//! Logging initialization for the phpkg binaries.
//!
//! It supports two modes:
//! - Cli mode: logs to STDERR, leaving STDOUT to progress output and JSON.
//! - Server mode: logs to STDERR and to a rolling file in the given directory.
//!
//! The server logs are rolled over when they reach 5 MB. Rotated logs are
//! compressed. The maximum number of rotated logs is 20.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use file_rotate::{ContentLimit, FileRotate, compression::Compression, suffix::AppendCount};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt::writer::MakeWriterExt};

pub const LOG_FILE_NAME: &str = "phpkg.log";
const MAX_LOG_FILES: usize = 20;
const MAX_LOG_BYTES: usize = 5 * 1024 * 1024;

pub enum LogMode {
    Cli,
    Server { log_dir: PathBuf },
}

/// Guard that keeps background logging workers alive.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn rotating_writer(log_dir: &Path) -> Result<FileRotate<AppendCount>> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    Ok(FileRotate::new(
        log_dir.join(LOG_FILE_NAME),
        AppendCount::new(MAX_LOG_FILES),
        ContentLimit::Bytes(MAX_LOG_BYTES),
        Compression::OnRotate(1),
        None,
    ))
}

pub fn init(mode: LogMode, verbose: bool) -> Result<Option<LoggingGuards>> {
    let filter = env_filter(verbose);

    match mode {
        LogMode::Cli => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .init();
            Ok(None)
        }
        LogMode::Server { log_dir } => {
            let writer = rotating_writer(&log_dir)?;

            let (file_non_blocking, file_guard) = tracing_appender::non_blocking(writer);
            // Callers may not drain stderr; bound the buffer and drop overflow.
            let (stderr_non_blocking, stderr_guard) = NonBlockingBuilder::default()
                .lossy(true)
                .buffered_lines_limit(10_000)
                .finish(std::io::stderr());

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(
                    file_non_blocking
                        .with_max_level(tracing::Level::INFO)
                        .and(stderr_non_blocking),
                )
                .with_ansi(false)
                .init();

            Ok(Some(LoggingGuards {
                _guards: vec![file_guard, stderr_guard],
            }))
        }
    }
}
