use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "phpkg",
    version,
    about = "PHP symbol index",
    long_about = "Indexes PHP workspaces and answers hover, definition, reference, completion and diagnostic queries."
)]
pub struct PhpkgCli {
    /// Also write logs to a rotating file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl PhpkgCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct IndexArgs {
    /// Number of worker threads (0 means auto-detect based on CPU cores)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file (defaults to phpkg.settings.json in the workspace)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Hover,
    Definition,
    References,
    Completion,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index every PHP file of a workspace
    Index {
        /// Directory to scan for PHP files
        #[arg(default_value = ".")]
        workspace_path: PathBuf,

        #[command(flatten)]
        index: IndexArgs,

        /// Save the indexing statistics as JSON to this file
        #[arg(long, value_name = "FILE")]
        stats: Option<PathBuf>,
    },
    /// Index a workspace and answer one query at a position, as JSON
    Query {
        /// Workspace directory to index first
        workspace_path: PathBuf,

        /// File to query, absolute or relative to the workspace
        file: PathBuf,

        /// 1-based line
        line: u32,

        /// 1-based column, in bytes
        column: u32,

        #[arg(long, value_enum)]
        kind: QueryKind,

        #[command(flatten)]
        index: IndexArgs,
    },
    /// Index a workspace and report diagnostics of one file, as JSON
    Diagnostics {
        /// Workspace directory to index first
        workspace_path: PathBuf,

        /// File to check, absolute or relative to the workspace
        file: PathBuf,

        #[command(flatten)]
        index: IndexArgs,
    },
}
