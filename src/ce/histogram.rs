//! Histogram-based estimation.

use super::error::{CeResult, HistogramCeFailure, HistogramCeFailureKind};
use super::estimator::{CardinalityEstimator, EstimateSource, EstimationContext, Selectivity};
use crate::query::{IntervalList, Predicate};
use crate::stats::Histogram;

/// Estimator backed by field histograms. Fails on any predicate it cannot
/// estimate from a histogram.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramEstimator;

impl CardinalityEstimator for HistogramEstimator {
    fn source(&self) -> EstimateSource {
        EstimateSource::Histogram
    }

    fn interval_selectivity(
        &self,
        field: &str,
        intervals: &IntervalList,
        ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity> {
        let histogram = ctx
            .histograms
            .get(ctx.collection, field)
            .ok_or_else(|| HistogramCeFailure::new(field, HistogramCeFailureKind::MissingHistogram))?;

        if !intervals.intervals().iter().all(Histogram::is_estimable) {
            return Err(HistogramCeFailure::new(
                field,
                HistogramCeFailureKind::UnestimableInterval,
            ));
        }

        Ok(Selectivity::new(
            histogram.selectivity(intervals),
            EstimateSource::Histogram,
        ))
    }

    fn inexact_selectivity(
        &self,
        leaf: &Predicate,
        _ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity> {
        Err(HistogramCeFailure::new(
            leaf.field().unwrap_or_default(),
            HistogramCeFailureKind::InexactInterval,
        ))
    }
}
