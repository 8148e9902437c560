//! Statistics errors.

use thiserror::Error;

/// Result type for statistics operations.
pub type StatsResult<T> = Result<T, StatsError>;

/// Statistics build and persistence errors.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("number of buckets must be at least 1, got {0}")]
    InvalidBucketCount(usize),

    #[error("empty field path")]
    EmptyField,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
