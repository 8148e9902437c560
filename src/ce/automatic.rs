//! Histogram estimation with heuristic recovery.

use tracing::warn;

use super::error::CeResult;
use super::estimator::{CardinalityEstimator, EstimateSource, EstimationContext, Selectivity};
use super::heuristic::HeuristicEstimator;
use super::histogram::HistogramEstimator;
use crate::query::{IntervalList, Predicate};

/// Tries the histogram for every leaf and substitutes the heuristic
/// estimate for the leaves it cannot handle. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomaticEstimator {
    histogram: HistogramEstimator,
    heuristic: HeuristicEstimator,
}

impl CardinalityEstimator for AutomaticEstimator {
    fn source(&self) -> EstimateSource {
        EstimateSource::Histogram
    }

    fn interval_selectivity(
        &self,
        field: &str,
        intervals: &IntervalList,
        ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity> {
        match self.histogram.interval_selectivity(field, intervals, ctx) {
            Ok(s) => Ok(s),
            Err(failure) => {
                warn!(%failure, "falling back to heuristic estimation");
                self.heuristic.interval_selectivity(field, intervals, ctx)
            }
        }
    }

    fn inexact_selectivity(
        &self,
        leaf: &Predicate,
        ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity> {
        match self.histogram.inexact_selectivity(leaf, ctx) {
            Ok(s) => Ok(s),
            Err(failure) => {
                warn!(%failure, "falling back to heuristic estimation");
                self.heuristic.inexact_selectivity(leaf, ctx)
            }
        }
    }
}
