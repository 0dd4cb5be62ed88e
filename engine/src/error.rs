//! Error types for the tablesync engine.

use crate::{CollectionName, SchemaVersion};
use thiserror::Error;

/// All possible errors from the tablesync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Schema errors
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("index '{index}' not found on collection '{collection}'")]
    IndexNotFound {
        collection: CollectionName,
        index: String,
    },

    #[error("unsupported schema version: stored {stored}, latest known {latest}")]
    UnsupportedVersion {
        stored: SchemaVersion,
        latest: SchemaVersion,
    },

    // Record errors
    #[error("record in '{collection}' has no usable key at '{key_path}'")]
    MissingKey {
        collection: CollectionName,
        key_path: String,
    },

    #[error("key already exists in '{collection}': {key}")]
    KeyAlreadyExists {
        collection: CollectionName,
        key: String,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
