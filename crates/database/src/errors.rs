//! Error types for the symbol store

use thiserror::Error;

/// Result type alias for symbol store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying key-value engine failed (I/O, poisoned lock, corruption)
    #[error("Storage engine error: {0}")]
    Engine(String),

    /// A stored value could not be decoded back into an entity
    #[error("Failed to decode value stored under {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// An entity could not be serialized
    #[error("Failed to encode {fqn}: {source}")]
    Encode {
        fqn: String,
        #[source]
        source: serde_json::Error,
    },

    /// A key component contained the reserved separator byte
    #[error("Invalid key component: {0:?}")]
    InvalidKey(String),
}
