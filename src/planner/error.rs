//! Planning errors.

use thiserror::Error;

/// Result type for planning operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Query planning errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("predicate is not a rooted $or")]
    NotRootedOr,

    #[error("no indexed solution for $or branch {0}")]
    BranchNotIndexed(usize),
}
