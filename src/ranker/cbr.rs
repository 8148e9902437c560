//! Cost-based ranking.

use tracing::debug;

use super::cost::PlanCostEstimator;
use super::error::{RankError, RankResult};
use super::{RankedPlan, RankedPlanSet, RankerMode};
use crate::ce::{CardinalityEstimator, EstimationContext};
use crate::planner::QuerySolution;

/// Ranks candidates by the estimated cost of their root.
///
/// On equal cost the candidate generated last wins. Rejected plans keep
/// generation order.
pub struct CostBasedRanker<'a> {
    costs: PlanCostEstimator<'a>,
    mode: RankerMode,
}

impl<'a> CostBasedRanker<'a> {
    pub fn new(
        estimator: &'a dyn CardinalityEstimator,
        ctx: EstimationContext<'a>,
        mode: RankerMode,
    ) -> Self {
        Self {
            costs: PlanCostEstimator::new(estimator, ctx),
            mode,
        }
    }

    /// Estimate every candidate and pick the cheapest. Any estimation
    /// failure aborts the ranking.
    pub fn rank(&self, candidates: Vec<QuerySolution>) -> RankResult<RankedPlanSet> {
        let mut plans = Vec::with_capacity(candidates.len());
        let mut best: Option<(usize, f64)> = None;

        for (i, solution) in candidates.into_iter().enumerate() {
            let estimates = self.costs.estimate(&solution)?;
            let cost = estimates.root_cost(&solution).unwrap_or(f64::INFINITY);
            debug!(plan = i, cost, shape = %solution.summary(), "costed candidate");

            if best.map_or(true, |(_, best_cost)| cost <= best_cost) {
                best = Some((i, cost));
            }
            plans.push(RankedPlan {
                solution,
                estimates: Some(estimates),
                score: Some(cost),
            });
        }

        let (winner, cost) = best.ok_or(RankError::NoCandidates)?;
        debug!(winner, cost, "cost-based ranking done");
        RankedPlanSet::from_candidates(plans, winner, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ce::{EstimateSource, HeuristicEstimator, HistogramEstimator};
    use crate::planner::QueryPlanner;
    use crate::query::{IntervalList, KeyValue, Parser};
    use crate::planner::IndexBounds;
    use crate::stats::HistogramSnapshot;
    use crate::storage::{Collection, CollectionName, IndexDescriptor};
    use serde_json::json;

    fn collection() -> Collection {
        let mut coll = Collection::new(CollectionName::new("coll").unwrap());
        coll.insert_many((0..200).map(|i| json!({"a": i, "b": i % 4}))).unwrap();
        coll.create_index(vec!["a".into()]).unwrap();
        coll.create_index(vec!["b".into()]).unwrap();
        coll
    }

    fn point_scan(field: &str, value: f64) -> QuerySolution {
        let mut solution = QuerySolution::new();
        let bounds = IndexBounds::new(vec![(
            field.to_string(),
            IntervalList::points([KeyValue::Number(value)]),
        )]);
        let scan = solution.ixscan(IndexDescriptor::new(vec![field.to_string()]), bounds);
        let root = solution.fetch(scan);
        solution.set_root(root);
        solution
    }

    #[test]
    fn test_cheapest_plan_wins() {
        let coll = collection();
        let snapshot = HistogramSnapshot::default();
        let ctx = EstimationContext::new("coll", coll.count() as f64, &snapshot);
        let filter = Parser::parse(&json!({"a": {"$lt": 150}, "b": 2})).unwrap();
        let plans = QueryPlanner::new(&coll).plan(&filter);

        let ranked = CostBasedRanker::new(&HeuristicEstimator, ctx, RankerMode::HeuristicCe)
            .rank(plans)
            .unwrap();
        assert_eq!(ranked.winner.solution.index_names(), vec!["b_1"]);
        assert_eq!(ranked.rejected.len(), 1);
        assert_eq!(ranked.source, EstimateSource::Heuristics);
    }

    #[test]
    fn test_ties_go_to_last_candidate() {
        let coll = collection();
        let snapshot = HistogramSnapshot::default();
        let ctx = EstimationContext::new("coll", coll.count() as f64, &snapshot);
        // Heuristic estimates for two equality scans are identical.
        let candidates = vec![point_scan("a", 1.0), point_scan("b", 1.0)];

        let ranked = CostBasedRanker::new(&HeuristicEstimator, ctx, RankerMode::HeuristicCe)
            .rank(candidates)
            .unwrap();
        assert_eq!(ranked.winner.solution.index_names(), vec!["b_1"]);
        assert_eq!(ranked.rejected[0].solution.index_names(), vec!["a_1"]);
        assert_eq!(ranked.winner.score, ranked.rejected[0].score);
    }

    #[test]
    fn test_rejected_keep_generation_order() {
        let coll = collection();
        let snapshot = HistogramSnapshot::default();
        let ctx = EstimationContext::new("coll", coll.count() as f64, &snapshot);
        let candidates = vec![point_scan("a", 1.0), point_scan("b", 1.0), point_scan("a", 2.0)];

        let ranked = CostBasedRanker::new(&HeuristicEstimator, ctx, RankerMode::HeuristicCe)
            .rank(candidates)
            .unwrap();
        let rejected: Vec<String> = ranked.rejected.iter().map(|p| p.solution.index_names().join(",")).collect();
        assert_eq!(rejected, vec!["a_1", "b_1"]);
    }

    #[test]
    fn test_strict_failure_propagates() {
        let coll = collection();
        let snapshot = HistogramSnapshot::default();
        let ctx = EstimationContext::new("coll", coll.count() as f64, &snapshot);
        let plans = QueryPlanner::new(&coll).plan(&Parser::parse(&json!({"a": 1})).unwrap());

        let err = CostBasedRanker::new(&HistogramEstimator, ctx, RankerMode::HistogramCe)
            .rank(plans)
            .unwrap_err();
        assert!(matches!(err, RankError::HistogramCe(_)));
    }

    #[test]
    fn test_no_candidates() {
        let snapshot = HistogramSnapshot::default();
        let ctx = EstimationContext::new("coll", 0.0, &snapshot);
        let err = CostBasedRanker::new(&HeuristicEstimator, ctx, RankerMode::HeuristicCe)
            .rank(Vec::new())
            .unwrap_err();
        assert_eq!(err, RankError::NoCandidates);
    }
}
