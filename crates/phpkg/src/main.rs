mod cli;
mod commands;

use anyhow::Result;
use logging::LogMode;

use crate::cli::{Commands, PhpkgCli};
use crate::commands::query::QueryRequest;

fn main() -> Result<()> {
    let cli = PhpkgCli::parse_args();

    let verbose = match &cli.command {
        Commands::Index { index, .. }
        | Commands::Query { index, .. }
        | Commands::Diagnostics { index, .. } => index.verbose,
    };
    let mode = match &cli.log_dir {
        Some(log_dir) => LogMode::Server {
            log_dir: log_dir.clone(),
        },
        None => LogMode::Cli,
    };
    let _guards = logging::init(mode, verbose)?;

    match cli.command {
        Commands::Index {
            workspace_path,
            index,
            stats,
        } => commands::index::run(workspace_path, &index, stats),
        Commands::Query {
            workspace_path,
            file,
            line,
            column,
            kind,
            index,
        } => commands::query::run(
            QueryRequest {
                workspace_path,
                file,
                line,
                column,
                kind,
            },
            &index,
        ),
        Commands::Diagnostics {
            workspace_path,
            file,
            index,
        } => commands::diagnostics::run(workspace_path, file, &index),
    }
}
