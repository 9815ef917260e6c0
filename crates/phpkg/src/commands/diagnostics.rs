use std::path::PathBuf;

use anyhow::Result;
use indexer::analysis::php::{ExpressionResolver, QuerySession};

use super::{index_quietly, load_document, resolve_file};
use crate::cli::IndexArgs;

pub fn run(workspace_path: PathBuf, file: PathBuf, args: &IndexArgs) -> Result<()> {
    let store = index_quietly(&workspace_path, args)?;
    let document = load_document(&resolve_file(&workspace_path, &file))?;
    let session = QuerySession::new(ExpressionResolver::new(&document, &store));

    let diagnostics = session.diagnostics()?;
    println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    Ok(())
}
