//! Heuristic estimation from fixed selectivities.
//!
//! Nothing here looks at the data: equality selectivity shrinks with the
//! collection size as `1 / sqrt(n)`, ranges use tiered constants.

use super::error::CeResult;
use super::estimator::{CardinalityEstimator, EstimateSource, EstimationContext, Selectivity};
use crate::query::{ComparisonOp, Interval, IntervalList, KeyValue, Predicate};

mod sel {
    /// Collection sizes below which the small/medium tiers apply.
    pub const SMALL_LIMIT: f64 = 20.0;
    pub const MEDIUM_LIMIT: f64 = 100.0;

    /// One-sided range, by tier.
    pub const OPEN_RANGE: [f64; 3] = [0.70, 0.50, 0.33];
    /// Two-sided range, by tier.
    pub const CLOSED_RANGE: [f64; 3] = [0.50, 0.33, 0.20];

    pub const EXISTS: f64 = 0.70;
}

/// Estimator that never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl HeuristicEstimator {
    fn tier(cardinality: f64) -> usize {
        if cardinality < sel::SMALL_LIMIT {
            0
        } else if cardinality < sel::MEDIUM_LIMIT {
            1
        } else {
            2
        }
    }

    pub fn equality(cardinality: f64) -> f64 {
        if cardinality <= 1.0 {
            1.0
        } else {
            1.0 / cardinality.sqrt()
        }
    }

    pub fn open_range(cardinality: f64) -> f64 {
        sel::OPEN_RANGE[Self::tier(cardinality)]
    }

    pub fn closed_range(cardinality: f64) -> f64 {
        sel::CLOSED_RANGE[Self::tier(cardinality)]
    }

    fn interval(interval: &Interval, cardinality: f64) -> f64 {
        if interval.is_point() {
            return Self::equality(cardinality);
        }
        if interval.is_full() {
            return 1.0;
        }
        if is_unbounded_start(interval) || is_unbounded_end(interval) {
            Self::open_range(cardinality)
        } else {
            Self::closed_range(cardinality)
        }
    }

    fn intervals(intervals: &IntervalList, cardinality: f64) -> f64 {
        if intervals.is_empty() {
            return 0.0;
        }
        let complement = intervals.complement();
        if complement.is_all_points() {
            // Negated equality or $nin.
            return 1.0 - Self::intervals(&complement, cardinality);
        }
        intervals
            .intervals()
            .iter()
            .map(|i| Self::interval(i, cardinality))
            .sum::<f64>()
            .min(1.0)
    }
}

fn is_unbounded_start(interval: &Interval) -> bool {
    let (min, _, _) = KeyValue::bracket_range(interval.start.bracket());
    interval.start == KeyValue::MinKey || (interval.start == min && interval.start_inclusive)
}

fn is_unbounded_end(interval: &Interval) -> bool {
    let (_, max, _) = KeyValue::bracket_range(interval.end.bracket());
    interval.end == KeyValue::MaxKey
        || interval.end == max
        || KeyValue::bracket_range(interval.start.bracket()).1 == interval.end
}

impl CardinalityEstimator for HeuristicEstimator {
    fn source(&self) -> EstimateSource {
        EstimateSource::Heuristics
    }

    fn interval_selectivity(
        &self,
        _field: &str,
        intervals: &IntervalList,
        ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity> {
        Ok(Selectivity::new(
            Self::intervals(intervals, ctx.cardinality),
            EstimateSource::Heuristics,
        ))
    }

    fn inexact_selectivity(
        &self,
        leaf: &Predicate,
        ctx: &EstimationContext<'_>,
    ) -> CeResult<Selectivity> {
        let n = ctx.cardinality;
        let value = match leaf {
            Predicate::Comparison { op, .. } => match op {
                ComparisonOp::Eq => Self::equality(n),
                ComparisonOp::Ne => 1.0 - Self::equality(n),
                _ => Self::open_range(n),
            },
            Predicate::In { values, negated, .. } => {
                let s = (values.len() as f64 * Self::equality(n)).min(1.0);
                if *negated {
                    1.0 - s
                } else {
                    s
                }
            }
            Predicate::Exists { exists, .. } => {
                if *exists {
                    sel::EXISTS
                } else {
                    1.0 - sel::EXISTS
                }
            }
            other => return self.selectivity(other, ctx),
        };
        Ok(Selectivity::new(value, EstimateSource::Heuristics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Parser;
    use crate::stats::HistogramSnapshot;
    use serde_json::json;

    fn selectivity(filter: serde_json::Value, n: f64) -> f64 {
        let snapshot = HistogramSnapshot::default();
        let ctx = EstimationContext::new("c", n, &snapshot);
        let predicate = Parser::parse(&filter).unwrap();
        HeuristicEstimator.selectivity(&predicate, &ctx).unwrap().value
    }

    #[test]
    fn test_equality_scales_with_size() {
        assert!((selectivity(json!({"a": 1}), 10000.0) - 0.01).abs() < 1e-12);
        assert_eq!(selectivity(json!({"a": 1}), 1.0), 1.0);
    }

    #[test]
    fn test_range_tiers() {
        assert_eq!(selectivity(json!({"a": {"$gt": 5}}), 10.0), 0.70);
        assert_eq!(selectivity(json!({"a": {"$gt": 5}}), 50.0), 0.50);
        assert_eq!(selectivity(json!({"a": {"$lt": 5}}), 5000.0), 0.33);
        assert_eq!(selectivity(json!({"a": {"$gt": 1, "$lt": 5}}), 5000.0), 0.20);
        assert_eq!(selectivity(json!({"a": {"$gt": "x"}}), 5000.0), 0.33);
    }

    #[test]
    fn test_in_list() {
        assert!((selectivity(json!({"a": {"$in": [1, 5]}}), 10000.0) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_negation() {
        assert!((selectivity(json!({"a": {"$ne": 1}}), 10000.0) - 0.99).abs() < 1e-12);
        assert!((selectivity(json!({"a": {"$not": {"$gt": 5}}}), 10000.0) - 0.67).abs() < 1e-12);
    }

    #[test]
    fn test_inexact_leaves_never_fail() {
        assert_eq!(selectivity(json!({"a": {"$exists": true}}), 100.0), 0.70);
        assert_eq!(selectivity(json!({"a": {"$gt": []}}), 100.0), 0.33);
    }

    #[test]
    fn test_empty_intersection() {
        assert_eq!(selectivity(json!({"a": {"$gt": 5, "$lt": 1}}), 100.0), 0.0);
    }
}
