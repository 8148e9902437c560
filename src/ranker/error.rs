//! Plan ranking errors.

use thiserror::Error;

use crate::ce::HistogramCeFailure;
use crate::executor::ExecuteError;
use crate::planner::PlanError;

/// Result type for plan ranking.
pub type RankResult<T> = Result<T, RankError>;

/// Plan ranking errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RankError {
    #[error(transparent)]
    HistogramCe(#[from] HistogramCeFailure),

    #[error("trial execution failed: {0}")]
    Execute(#[from] ExecuteError),

    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    #[error("no candidate plans to rank")]
    NoCandidates,
}
