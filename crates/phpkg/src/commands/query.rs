use std::path::PathBuf;

use anyhow::{Result, anyhow};
use indexer::analysis::php::session::CompletionItem;
use indexer::analysis::php::{ExpressionResolver, QuerySession};
use indexer::parsing::line_index::LineIndex;
use indexer::parsing::tree::Position;
use serde_json::Value;
use tracing::debug;

use super::{index_quietly, load_document, resolve_file};
use crate::cli::{IndexArgs, QueryKind};

pub struct QueryRequest {
    pub workspace_path: PathBuf,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub kind: QueryKind,
}

/// Identifier (or `$variable`) being typed right before `offset`.
fn typed_prefix(text: &str, offset: usize) -> &str {
    let offset = offset.min(text.len());
    if !text.is_char_boundary(offset) {
        return "";
    }
    let head = &text[..offset];
    let start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '\\')
        .last()
        .map(|(index, _)| index)
        .unwrap_or(head.len());
    if start > 0 && head[..start].ends_with('$') {
        &head[start - 1..]
    } else {
        &head[start..]
    }
}

fn complete(session: &QuerySession<'_>, offset: u32) -> Result<Vec<CompletionItem>> {
    let members = session.complete_members(offset)?;
    if !members.is_empty() {
        return Ok(members);
    }

    let prefix = typed_prefix(session.document().text(), offset as usize);
    debug!("Completing prefix {prefix:?}");
    if prefix.starts_with('$') {
        Ok(session.complete_variables(offset, prefix))
    } else if prefix.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(session.complete_classes(offset, prefix)?)
    }
}

pub fn run(request: QueryRequest, args: &IndexArgs) -> Result<()> {
    let store = index_quietly(&request.workspace_path, args)?;
    let document = load_document(&resolve_file(&request.workspace_path, &request.file))?;

    let position = Position::new(
        request.line.saturating_sub(1),
        request.column.saturating_sub(1),
    );
    let offset = LineIndex::new(document.text())
        .offset(position)
        .ok_or_else(|| {
            anyhow!("Position {}:{} is outside the file", request.line, request.column)
        })?;

    let session = QuerySession::new(ExpressionResolver::new(&document, &store));
    let answer: Value = match request.kind {
        QueryKind::Hover => serde_json::to_value(session.hover(offset)?)?,
        QueryKind::Definition => serde_json::to_value(session.definition(offset)?)?,
        QueryKind::References => serde_json::to_value(session.references(offset)?)?,
        QueryKind::Completion => serde_json::to_value(complete(&session, offset)?)?,
    };
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}
