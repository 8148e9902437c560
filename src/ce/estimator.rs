//! The estimator capability and the predicate traversal shared by every
//! cardinality estimation strategy.

use std::fmt;

use serde::Serialize;

use super::error::CeResult;
use crate::query::{leaf_intervals, IntervalList, Predicate};
use crate::stats::HistogramSnapshot;

/// Maximum number of terms exponential backoff combines.
const MAX_BACKOFF_TERMS: usize = 4;

/// Which estimator produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EstimateSource {
    Heuristics,
    Histogram,
    /// Histogram estimates with heuristic fallbacks.
    Mixed,
    MultiPlanning,
    /// Exact counts read from collection metadata.
    Metadata,
}

impl EstimateSource {
    /// Source of an estimate derived from two others.
    pub fn merge(self, other: EstimateSource) -> EstimateSource {
        match (self, other) {
            (a, b) if a == b => a,
            (EstimateSource::Metadata, x) | (x, EstimateSource::Metadata) => x,
            _ => EstimateSource::Mixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateSource::Heuristics => "Heuristics",
            EstimateSource::Histogram => "Histogram",
            EstimateSource::Mixed => "Mixed",
            EstimateSource::MultiPlanning => "MultiPlanning",
            EstimateSource::Metadata => "Metadata",
        }
    }
}

impl fmt::Display for EstimateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A selectivity in `[0, 1]` and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selectivity {
    pub value: f64,
    pub source: EstimateSource,
}

impl Selectivity {
    pub fn new(value: f64, source: EstimateSource) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            source,
        }
    }

    fn merged_source(parts: &[Selectivity], default: EstimateSource) -> EstimateSource {
        parts
            .iter()
            .map(|p| p.source)
            .reduce(EstimateSource::merge)
            .unwrap_or(default)
    }
}

/// Inputs shared by all estimates of one compile.
#[derive(Debug, Clone, Copy)]
pub struct EstimationContext<'a> {
    pub collection: &'a str,
    /// Exact number of documents in the collection.
    pub cardinality: f64,
    pub histograms: &'a HistogramSnapshot,
}

impl<'a> EstimationContext<'a> {
    pub fn new(collection: &'a str, cardinality: f64, histograms: &'a HistogramSnapshot) -> Self {
        Self {
            collection,
            cardinality,
            histograms,
        }
    }

    /// Turn a selectivity into a row count. Non-empty collections never
    /// estimate below one document.
    pub fn cardinality_of(&self, selectivity: f64) -> f64 {
        if self.cardinality <= 0.0 {
            0.0
        } else {
            (selectivity * self.cardinality).clamp(1.0, self.cardinality)
        }
    }
}

/// Combine conjunct selectivities, most selective first, damping each
/// further term by another square root.
pub fn conjunction_backoff(selectivities: &[f64]) -> f64 {
    let mut sorted = selectivities.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
        .iter()
        .take(MAX_BACKOFF_TERMS)
        .enumerate()
        .map(|(i, s)| s.powf(1.0 / (1u32 << i) as f64))
        .product()
}

/// Combine disjunct selectivities with the complementary backoff.
pub fn disjunction_backoff(selectivities: &[f64]) -> f64 {
    let mut sorted = selectivities.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let missed: f64 = sorted
        .iter()
        .take(MAX_BACKOFF_TERMS)
        .enumerate()
        .map(|(i, s)| (1.0 - s).powf(1.0 / (1u32 << i) as f64))
        .product();
    1.0 - missed
}

/// A cardinality estimation strategy.
///
/// Implementations decide how a single field's intervals (or a leaf that
/// has no exact interval form) are estimated; the traversal of boolean
/// structure is shared.
pub trait CardinalityEstimator: Send + Sync {
    /// The source tag this strategy reports when all of its estimates come
    /// from itself.
    fn source(&self) -> EstimateSource;

    /// Selectivity of `field IN intervals`.
    fn interval_selectivity(
        &self,
        field: &str,
        intervals: &IntervalList,
        ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity>;

    /// Selectivity of a leaf without an exact interval form.
    fn inexact_selectivity(
        &self,
        leaf: &Predicate,
        ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity>;

    /// Selectivity of an arbitrary predicate.
    fn selectivity(&self, predicate: &Predicate, ctx: &EstimationContext<'_>) -> CeResult<Selectivity> {
        match predicate {
            Predicate::And(children) => {
                let conjuncts: Vec<&Predicate> = children.iter().collect();
                self.conjunction_selectivity(&conjuncts, ctx)
            }
            Predicate::Or(children) => {
                let parts = children
                    .iter()
                    .map(|c| self.selectivity(c, ctx))
                    .collect::<CeResult<Vec<_>>>()?;
                let values: Vec<f64> = parts.iter().map(|p| p.value).collect();
                Ok(Selectivity::new(
                    disjunction_backoff(&values),
                    Selectivity::merged_source(&parts, self.source()),
                ))
            }
            Predicate::Not(inner) => {
                let s = self.selectivity(inner, ctx)?;
                Ok(Selectivity::new(1.0 - s.value, s.source))
            }
            leaf => match (leaf.field(), leaf_intervals(leaf)) {
                (Some(field), Some(intervals)) => self.interval_selectivity(field, &intervals, ctx),
                _ => self.inexact_selectivity(leaf, ctx),
            },
        }
    }

    /// Selectivity of a conjunction. Exact leaves on the same field are
    /// intersected into one interval list before estimation.
    fn conjunction_selectivity(
        &self,
        conjuncts: &[&Predicate],
        ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity> {
        let mut by_field: Vec<(&str, IntervalList)> = Vec::new();
        let mut others: Vec<&Predicate> = Vec::new();

        for conjunct in conjuncts {
            match (conjunct.field(), leaf_intervals(conjunct)) {
                (Some(field), Some(intervals)) => {
                    match by_field.iter_mut().find(|(f, _)| *f == field) {
                        Some((_, list)) => *list = list.intersect(&intervals),
                        None => by_field.push((field, intervals)),
                    }
                }
                _ => others.push(*conjunct),
            }
        }

        let mut parts = Vec::with_capacity(by_field.len() + others.len());
        for (field, intervals) in &by_field {
            parts.push(self.interval_selectivity(field, intervals, ctx)?);
        }
        for other in others {
            parts.push(self.selectivity(other, ctx)?);
        }

        let values: Vec<f64> = parts.iter().map(|p| p.value).collect();
        Ok(Selectivity::new(
            conjunction_backoff(&values),
            Selectivity::merged_source(&parts, self.source()),
        ))
    }

    /// Estimated number of documents matching a predicate.
    fn estimate(&self, predicate: &Predicate, ctx: &EstimationContext<'_>) -> CeResult<(f64, EstimateSource)> {
        if predicate.is_trivially_true() {
            return Ok((ctx.cardinality, EstimateSource::Metadata));
        }
        let s = self.selectivity(predicate, ctx)?;
        Ok((ctx.cardinality_of(s.value), s.source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conjunction_backoff() {
        let s = conjunction_backoff(&[0.25, 0.01]);
        assert!((s - 0.01 * 0.5).abs() < 1e-12);
        assert_eq!(conjunction_backoff(&[]), 1.0);
        let four = conjunction_backoff(&[0.5, 0.5, 0.5, 0.5]);
        assert_eq!(conjunction_backoff(&[0.5, 0.5, 0.5, 0.5, 0.9]), four);
    }

    #[test]
    fn test_disjunction_backoff() {
        assert_eq!(disjunction_backoff(&[]), 0.0);
        assert!((disjunction_backoff(&[0.3]) - 0.3).abs() < 1e-12);
        let s = disjunction_backoff(&[0.1, 0.2]);
        assert!(s > 0.2 && s < 0.3);
    }

    #[test]
    fn test_source_merge() {
        use EstimateSource::*;
        assert_eq!(Histogram.merge(Histogram), Histogram);
        assert_eq!(Metadata.merge(Heuristics), Heuristics);
        assert_eq!(Histogram.merge(Heuristics), Mixed);
    }

    #[test]
    fn test_cardinality_floor() {
        let snapshot = HistogramSnapshot::default();
        let ctx = EstimationContext::new("c", 1000.0, &snapshot);
        assert_eq!(ctx.cardinality_of(0.0), 1.0);
        assert_eq!(ctx.cardinality_of(0.5), 500.0);
        let empty = EstimationContext::new("c", 0.0, &snapshot);
        assert_eq!(empty.cardinality_of(0.5), 0.0);
    }
}
