//! Cardinality estimation.
//!
//! Three interchangeable strategies implement [`CardinalityEstimator`]:
//!
//! - [`HeuristicEstimator`]: fixed selectivities, never fails.
//! - [`HistogramEstimator`]: bucket interpolation, fails with a
//!   [`HistogramCeFailure`] when a predicate cannot be estimated.
//! - [`AutomaticEstimator`]: histogram first, heuristic for the leaves the
//!   histogram cannot handle.
//!
//! Execution-based ranking does not estimate at all; it lives in the ranker.

mod automatic;
mod error;
mod estimator;
mod heuristic;
mod histogram;

pub use automatic::AutomaticEstimator;
pub use error::{CeResult, HistogramCeFailure, HistogramCeFailureKind};
pub use estimator::{
    conjunction_backoff, disjunction_backoff, CardinalityEstimator, EstimateSource,
    EstimationContext, Selectivity,
};
pub use heuristic::HeuristicEstimator;
pub use histogram::HistogramEstimator;
