//! Storage layer error types

use thiserror::Error;

use crate::storage::types::InvalidNameError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// the requested collection was not found
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// the collection already exists
    #[error("collection already exists: {0}")]
    CollectionAlreadyExists(String),

    /// an index with the same key pattern exists
    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    /// index key patterns need at least one field
    #[error("index key pattern cannot be empty")]
    EmptyKeyPattern,

    /// documents must be JSON objects
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// invalid collection name
    #[error("invalid collection name: {0}")]
    InvalidName(#[from] InvalidNameError),
}
