use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::engine::{KvEngine, MemoryEngine, WriteBatch};
use crate::errors::{Result, StoreError};
use crate::keys::{self, Collection};

/// One serialized declaration ready to be written.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub collection: Collection,
    pub fqn: String,
    pub disambiguator: String,
    pub value: Vec<u8>,
    /// Lowercased completion tokens indexing this entry.
    pub tokens: Vec<String>,
}

impl StoreEntry {
    pub fn new<T: Serialize>(
        collection: Collection,
        fqn: impl Into<String>,
        disambiguator: impl Into<String>,
        entity: &T,
    ) -> Result<Self> {
        let fqn = fqn.into();
        let disambiguator = disambiguator.into();
        keys::check_component(&fqn)?;
        keys::check_component(&disambiguator)?;
        let value = serde_json::to_vec(entity).map_err(|source| StoreError::Encode {
            fqn: fqn.clone(),
            source,
        })?;

        Ok(Self {
            collection,
            fqn,
            disambiguator,
            value,
            tokens: Vec::new(),
        })
    }

    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            let token = token.as_ref().to_lowercase();
            if !token.is_empty() && !self.tokens.contains(&token) {
                self.tokens.push(token);
            }
        }
        self
    }

    fn key(&self) -> Vec<u8> {
        keys::entity_key(self.collection, &self.fqn, &self.disambiguator)
    }
}

/// A site in `uri` referring to `fqn`.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub fqn: String,
    pub uri: String,
    pub range: (u32, u32),
    pub value: Vec<u8>,
}

impl ReferenceEntry {
    pub fn new<T: Serialize>(
        fqn: impl Into<String>,
        uri: impl Into<String>,
        range: (u32, u32),
        site: &T,
    ) -> Result<Self> {
        let fqn = fqn.into();
        let uri = uri.into();
        keys::check_component(&fqn)?;
        keys::check_component(&uri)?;
        let value = serde_json::to_vec(site).map_err(|source| StoreError::Encode {
            fqn: fqn.clone(),
            source,
        })?;

        Ok(Self {
            fqn,
            uri,
            range,
            value,
        })
    }

    fn range_component(&self) -> String {
        format!("{}:{}", self.range.0, self.range.1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub written: usize,
    pub deleted: usize,
}

/// Multi-file symbol index over a [`KvEngine`].
#[derive(Clone)]
pub struct SymbolStore {
    engine: Arc<dyn KvEngine>,
}

impl SymbolStore {
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Self { engine }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()))
    }

    /// Writes a single entry outside of any document sync.
    pub fn put(&self, entry: StoreEntry) -> Result<()> {
        let mut batch = WriteBatch::new();
        let key = entry.key();
        for token in &entry.tokens {
            batch.put(
                keys::completion_key(entry.collection, token, &entry.disambiguator),
                entry.fqn.clone().into_bytes(),
            );
        }
        batch.put(key, entry.value);
        self.engine.write(batch)
    }

    /// Every entity stored under exactly `fqn`, one per declaring site.
    pub fn get_exact<T: DeserializeOwned>(
        &self,
        collection: Collection,
        fqn: &str,
    ) -> Result<Vec<T>> {
        let prefix = keys::entity_exact_prefix(collection, fqn);
        self.decode_all(self.engine.scan_prefix(&prefix)?)
    }

    /// Every entity whose fqn starts with `fqn_prefix`, e.g. all members of a
    /// class when given `\Foo::`.
    pub fn get_by_prefix<T: DeserializeOwned>(
        &self,
        collection: Collection,
        fqn_prefix: &str,
    ) -> Result<Vec<T>> {
        let prefix = keys::entity_open_prefix(collection, fqn_prefix);
        self.decode_all(self.engine.scan_prefix(&prefix)?)
    }

    /// Distinct fqns whose completion tokens start with `prefix`.
    pub fn prefix_search(&self, collection: Collection, prefix: &str) -> Result<Vec<String>> {
        let scan = keys::completion_prefix(collection, &prefix.to_lowercase());
        let mut seen = FxHashSet::default();
        let mut fqns = Vec::new();
        for (_, value) in self.engine.scan_prefix(&scan)? {
            let fqn = String::from_utf8(value)
                .map_err(|e| StoreError::Engine(format!("non UTF-8 completion value: {e}")))?;
            if seen.insert(fqn.clone()) {
                fqns.push(fqn);
            }
        }
        Ok(fqns)
    }

    /// Sites recorded as referring to `fqn`, across all documents.
    pub fn references<T: DeserializeOwned>(&self, fqn: &str) -> Result<Vec<T>> {
        let prefix = keys::reference_prefix(fqn);
        self.decode_all(self.engine.scan_prefix(&prefix)?)
    }

    /// Replaces everything previously stored for `uri` with `entries` and
    /// `references` in one atomic batch.
    pub fn sync_document(
        &self,
        uri: &str,
        entries: Vec<StoreEntry>,
        references: Vec<ReferenceEntry>,
    ) -> Result<SyncStats> {
        keys::check_component(uri)?;

        let previous_keys = self.document_keys(uri)?;
        let previous_references = self.engine.scan_prefix(&keys::reverse_reference_prefix(uri))?;

        let mut batch = WriteBatch::new();
        let mut current_keys: FxHashSet<Vec<u8>> = FxHashSet::default();

        for entry in entries {
            let key = entry.key();
            for token in &entry.tokens {
                let completion =
                    keys::completion_key(entry.collection, token, &entry.disambiguator);
                batch.put(completion.clone(), entry.fqn.clone().into_bytes());
                current_keys.insert(completion);
            }
            batch.put(key.clone(), entry.value);
            current_keys.insert(key);
        }

        let mut current_references: FxHashSet<Vec<u8>> = FxHashSet::default();
        for reference in references {
            let range = reference.range_component();
            let reverse = keys::reverse_reference_key(uri, &reference.fqn, &range);
            batch.put(keys::reference_key(&reference.fqn, uri, &range), reference.value);
            batch.put(reverse.clone(), Vec::new());
            current_references.insert(reverse);
        }

        for key in &current_keys {
            batch.put(keys::document_key(uri, key), Vec::new());
        }

        let mut deleted = 0;
        for key in previous_keys.difference(&current_keys) {
            batch.delete(key.clone());
            batch.delete(keys::document_key(uri, key));
            deleted += 1;
        }
        for (reverse, _) in previous_references {
            if !current_references.contains(&reverse) {
                batch.delete(keys::forward_from_reverse(&reverse)?);
                batch.delete(reverse);
                deleted += 1;
            }
        }

        let stats = SyncStats {
            written: current_keys.len() + current_references.len(),
            deleted,
        };
        debug!(
            uri,
            written = stats.written,
            deleted = stats.deleted,
            operations = batch.len(),
            "Synchronising document with symbol store"
        );
        self.engine.write(batch)?;
        Ok(stats)
    }

    /// Drops every key stored for `uri`.
    pub fn remove_document(&self, uri: &str) -> Result<SyncStats> {
        self.sync_document(uri, Vec::new(), Vec::new())
    }

    fn document_keys(&self, uri: &str) -> Result<FxHashSet<Vec<u8>>> {
        let prefix = keys::document_prefix(uri);
        Ok(self
            .engine
            .scan_prefix(&prefix)?
            .into_iter()
            .map(|(key, _)| key[prefix.len()..].to_vec())
            .collect())
    }

    fn decode_all<T: DeserializeOwned>(&self, rows: Vec<(Vec<u8>, Vec<u8>)>) -> Result<Vec<T>> {
        rows.into_iter()
            .map(|(key, value)| {
                serde_json::from_slice(&value).map_err(|source| StoreError::Decode {
                    key: keys::printable(&key),
                    source,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingEngine;
    use serde::Deserialize;
    use tracing_test::traced_test;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Declared {
        name: String,
        uri: String,
    }

    fn declared(name: &str, uri: &str) -> Declared {
        Declared {
            name: name.to_string(),
            uri: uri.to_string(),
        }
    }

    fn class_entry(fqn: &str, uri: &str) -> StoreEntry {
        let short = fqn.rsplit('\\').next().unwrap_or(fqn);
        StoreEntry::new(Collection::Class, fqn, format!("{uri}#0"), &declared(fqn, uri))
            .unwrap()
            .with_tokens([short, fqn])
    }

    #[traced_test]
    #[test]
    fn test_sync_logs_batch_summary() {
        let store = SymbolStore::in_memory();
        store
            .sync_document("file:///a.php", vec![class_entry("\\A", "file:///a.php")], vec![])
            .unwrap();

        assert!(logs_contain("Synchronising document with symbol store"));
    }

    #[test]
    fn test_get_exact_returns_every_declaring_file() {
        let store = SymbolStore::in_memory();
        store
            .sync_document(
                "file:///a.php",
                vec![class_entry("\\App\\User", "file:///a.php")],
                vec![],
            )
            .unwrap();
        store
            .sync_document(
                "file:///b.php",
                vec![class_entry("\\App\\User", "file:///b.php")],
                vec![],
            )
            .unwrap();

        let found: Vec<Declared> = store.get_exact(Collection::Class, "\\app\\USER").unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.contains(&declared("\\App\\User", "file:///a.php")));
        assert!(found.contains(&declared("\\App\\User", "file:///b.php")));
    }

    #[test]
    fn test_prefix_search_deduplicates_fqns() {
        let store = SymbolStore::in_memory();
        store
            .sync_document(
                "file:///a.php",
                vec![
                    class_entry("\\App\\User", "file:///a.php"),
                    class_entry("\\App\\UserRepository", "file:///a.php"),
                    class_entry("\\App\\Post", "file:///a.php"),
                ],
                vec![],
            )
            .unwrap();

        let found = store.prefix_search(Collection::Class, "Use").unwrap();

        assert_eq!(found, vec!["\\App\\User".to_string(), "\\App\\UserRepository".to_string()]);
    }

    #[test]
    fn test_sync_replaces_renamed_declaration() {
        let store = SymbolStore::in_memory();
        let uri = "file:///a.php";
        store
            .sync_document(uri, vec![class_entry("\\Old", uri), class_entry("\\Kept", uri)], vec![])
            .unwrap();

        let stats = store
            .sync_document(uri, vec![class_entry("\\New", uri), class_entry("\\Kept", uri)], vec![])
            .unwrap();

        assert!(stats.deleted > 0);
        assert!(store.get_exact::<Declared>(Collection::Class, "\\Old").unwrap().is_empty());
        assert_eq!(store.get_exact::<Declared>(Collection::Class, "\\New").unwrap().len(), 1);
        assert_eq!(store.get_exact::<Declared>(Collection::Class, "\\Kept").unwrap().len(), 1);
        assert!(store.prefix_search(Collection::Class, "old").unwrap().is_empty());
    }

    #[test]
    fn test_sync_leaves_other_documents_alone() {
        let store = SymbolStore::in_memory();
        store
            .sync_document("file:///a.php", vec![class_entry("\\A", "file:///a.php")], vec![])
            .unwrap();
        store
            .sync_document("file:///b.php", vec![class_entry("\\B", "file:///b.php")], vec![])
            .unwrap();

        store.remove_document("file:///a.php").unwrap();

        assert!(store.get_exact::<Declared>(Collection::Class, "\\A").unwrap().is_empty());
        assert_eq!(store.get_exact::<Declared>(Collection::Class, "\\B").unwrap().len(), 1);
    }

    #[test]
    fn test_references_are_replaced_per_document() {
        let store = SymbolStore::in_memory();
        let uri = "file:///a.php";
        let first = ReferenceEntry::new("\\Foo", uri, (10, 13), &declared("site", uri)).unwrap();
        store.sync_document(uri, vec![], vec![first]).unwrap();
        assert_eq!(store.references::<Declared>("\\foo").unwrap().len(), 1);

        let moved = ReferenceEntry::new("\\Foo", uri, (20, 23), &declared("moved", uri)).unwrap();
        store.sync_document(uri, vec![], vec![moved]).unwrap();

        let sites: Vec<Declared> = store.references("\\Foo").unwrap();
        assert_eq!(sites, vec![declared("moved", uri)]);
    }

    #[test]
    fn test_members_by_scope_prefix() {
        let store = SymbolStore::in_memory();
        let entries = vec![
            StoreEntry::new(Collection::Method, "\\A::run", "a#1", &declared("run", "a")).unwrap(),
            StoreEntry::new(Collection::Method, "\\A::stop", "a#2", &declared("stop", "a"))
                .unwrap(),
            StoreEntry::new(Collection::Method, "\\AB::run", "a#3", &declared("other", "a"))
                .unwrap(),
        ];
        store.sync_document("a", entries, vec![]).unwrap();

        let members: Vec<Declared> = store.get_by_prefix(Collection::Method, "\\A::").unwrap();

        assert_eq!(members.len(), 2);
    }

    #[test]
    fn test_corrupt_value_is_a_decode_error() {
        let engine = Arc::new(CountingEngine::new());
        let store = SymbolStore::new(engine.clone());
        let mut batch = WriteBatch::new();
        batch.put(
            keys::entity_key(Collection::Class, "\\Broken", "x#0"),
            b"{\"name\":".to_vec(),
        );
        engine.write(batch).unwrap();

        let result = store.get_exact::<Declared>(Collection::Class, "\\Broken");

        assert!(matches!(result, Err(StoreError::Decode { .. })));
    }

    #[test]
    fn test_invalid_uri_is_rejected() {
        let store = SymbolStore::in_memory();
        let result = store.sync_document("bad\0uri", vec![], vec![]);

        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }
}
