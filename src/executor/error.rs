//! Query execution errors.

use thiserror::Error;

use crate::storage::RecordId;

/// Result type for query execution.
pub type ExecuteResult<T> = Result<T, ExecuteError>;

/// Query execution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecuteError {
    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("record {0} does not exist")]
    MissingRecord(RecordId),

    #[error("plan has no nodes")]
    EmptyPlan,
}
