//! Persisted symbol index shared by every document of a workspace.
//!
//! The store sits on top of a [`KvEngine`](engine::KvEngine): point lookups,
//! ordered prefix scans and atomic write batches are all it needs from the
//! storage layer. Entities are kept as serialized bytes under
//! `(collection, fqn, disambiguator)` keys so several files may declare the
//! same fully-qualified name; the reverse per-document index lets a document
//! be replaced in a single batch.

pub mod engine;
pub mod errors;
pub mod keys;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use engine::{KvEngine, MemoryEngine, WriteBatch};
pub use errors::{Result, StoreError};
pub use keys::{Collection, MEMBER_SEPARATOR};
pub use store::{ReferenceEntry, StoreEntry, SymbolStore, SyncStats};
