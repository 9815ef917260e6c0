use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use database::{SymbolStore, SyncStats};
use tracing::{debug, info};

use crate::analysis::php::{Document, ExpressionResolver, QuerySession};
use crate::errors::{IndexerError, Result};

/// Documents currently open in an editor, on top of the shared store.
///
/// Edits to one URI are serialised by the document's mutex; different URIs
/// are parsed and synced independently.
pub struct Workspace {
    store: SymbolStore,
    documents: DashMap<String, Arc<Mutex<Document>>>,
}

impl Workspace {
    pub fn new(store: SymbolStore) -> Self {
        Self {
            store,
            documents: DashMap::new(),
        }
    }

    pub fn store(&self) -> &SymbolStore {
        &self.store
    }

    pub fn is_open(&self, uri: &str) -> bool {
        self.documents.contains_key(uri)
    }

    pub fn open_documents(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.documents.iter().map(|e| e.key().clone()).collect();
        uris.sort();
        uris
    }

    pub fn open(&self, uri: &str, text: impl Into<String>) -> Result<SyncStats> {
        info!("Opening document {uri}");
        self.change(uri, text)
    }

    /// Re-parses `uri` with its full new text and replaces its stored
    /// declarations.
    pub fn change(&self, uri: &str, text: impl Into<String>) -> Result<SyncStats> {
        let slot = self
            .documents
            .entry(uri.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Document::default())))
            .clone();
        let mut current = slot
            .lock()
            .map_err(|_| IndexerError::Parse(format!("document lock poisoned: {uri}")))?;

        let document = Document::parse(uri, text)?;
        let stats = document.sync(&self.store)?;
        debug!(
            "Updated {uri}: {} written, {} deleted",
            stats.written, stats.deleted
        );
        *current = document;
        Ok(stats)
    }

    /// Stops tracking `uri`. Its declarations stay in the store so other
    /// documents keep resolving against them.
    pub fn close(&self, uri: &str) -> bool {
        info!("Closing document {uri}");
        self.documents.remove(uri).is_some()
    }

    /// Runs `query` against a fresh session over the open document `uri`.
    pub fn with_session<R>(
        &self,
        uri: &str,
        query: impl FnOnce(&QuerySession<'_>) -> Result<R>,
    ) -> Result<Option<R>> {
        let Some(slot) = self.documents.get(uri).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        let document = slot
            .lock()
            .map_err(|_| IndexerError::Parse(format!("document lock poisoned: {uri}")))?;
        let session = QuerySession::new(ExpressionResolver::new(&document, &self.store));
        query(&session).map(Some)
    }
}
