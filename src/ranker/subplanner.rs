//! Planning for predicates rooted at `$or`.
//!
//! Each branch is planned and ranked on its own so branches can use
//! different indexes; the branch winners are merged under one OR stage.
//! If any branch cannot be planned or ranked, the whole predicate is
//! planned as one query instead. That fallback also hides estimation
//! failures of the branches.

use tracing::{debug, warn};

use super::cost::PlanEstimates;
use super::error::RankResult;
use super::{PlanRanker, RankedPlan, RankedPlanSet};
use crate::ce::EstimateSource;
use crate::planner::{NodeId, QuerySolution};
use crate::query::Predicate;

pub struct SubqueryPlanner<'r, 'a> {
    ranker: &'r PlanRanker<'a>,
}

impl<'r, 'a> SubqueryPlanner<'r, 'a> {
    pub fn new(ranker: &'r PlanRanker<'a>) -> Self {
        Self { ranker }
    }

    /// Plan a rooted `$or`.
    pub fn plan(&self, predicate: &Predicate) -> RankResult<RankedPlanSet> {
        match self.plan_branches(predicate) {
            Ok(set) => Ok(set),
            Err(err) => {
                warn!(error = %err, "subquery planning failed, planning the whole query");
                self.plan_whole(predicate)
            }
        }
    }

    fn plan_branches(&self, predicate: &Predicate) -> RankResult<RankedPlanSet> {
        let branches = self.ranker.planner().plan_branches(predicate)?;

        let mut composite = QuerySolution::new();
        let mut estimates: Option<PlanEstimates> = None;
        let mut source: Option<EstimateSource> = None;
        let mut roots = Vec::with_capacity(branches.len());

        for (i, candidates) in branches.into_iter().enumerate() {
            let ranked = self.ranker.rank_candidates(candidates)?;
            debug!(branch = i, shape = %ranked.winner.solution.summary(), "branch planned");

            let (root, mapping) = composite.append(&ranked.winner.solution);
            roots.push(root);
            source = Some(source.map_or(ranked.source, |s| s.merge(ranked.source)));

            if let Some(branch_estimates) = &ranked.winner.estimates {
                let target = estimates.get_or_insert_with(|| PlanEstimates::empty(0, ranked.source));
                for (old, new) in mapping.iter().enumerate() {
                    if let Some(estimate) = branch_estimates.get(NodeId(old)) {
                        target.set(*new, *estimate);
                    }
                }
            }
        }

        let root = composite.or(roots);
        composite.set_root(root);

        let source = source.unwrap_or_else(|| self.ranker.primary_source());
        if let Some(estimates) = estimates.as_mut() {
            estimates.set_source(source);
        }

        Ok(RankedPlanSet {
            winner: RankedPlan {
                solution: composite,
                estimates,
                score: None,
            },
            rejected: Vec::new(),
            mode: self.ranker.mode(),
            source,
        })
    }

    /// Plan the predicate as a single query. A lone candidate is returned
    /// as is, without estimates.
    fn plan_whole(&self, predicate: &Predicate) -> RankResult<RankedPlanSet> {
        let mut candidates = self.ranker.planner().plan(predicate);
        if candidates.len() > 1 {
            return self.ranker.rank_candidates(candidates);
        }
        let solution = candidates.pop().unwrap_or_default();
        Ok(RankedPlanSet {
            winner: RankedPlan {
                solution,
                estimates: None,
                score: None,
            },
            rejected: Vec::new(),
            mode: self.ranker.mode(),
            source: self.ranker.primary_source(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Stage;
    use crate::query::Parser;
    use crate::ranker::RankerMode;
    use crate::stats::{Histogram, HistogramSnapshot, HistogramStore};
    use crate::storage::{Collection, CollectionName};
    use serde_json::json;

    fn collection() -> Collection {
        let mut coll = Collection::new(CollectionName::new("coll").unwrap());
        coll.insert_many((0..100).map(|i| json!({"a": i, "b": i % 10, "c": i}))).unwrap();
        coll.create_index(vec!["a".into()]).unwrap();
        coll.create_index(vec!["b".into()]).unwrap();
        coll
    }

    fn snapshot(coll: &Collection, fields: &[&str]) -> HistogramSnapshot {
        let store = HistogramStore::new();
        for field in fields {
            let values = coll.iter().map(|(_, doc)| doc.get(*field));
            store.publish(Histogram::build("coll", field, values, 10).unwrap());
        }
        store.snapshot()
    }

    #[test]
    fn test_branches_use_their_own_indexes() {
        let coll = collection();
        let snapshot = snapshot(&coll, &["a", "b"]);
        let ranker = PlanRanker::new(&coll, &snapshot, RankerMode::AutomaticCe);
        let filter = Parser::parse(&json!({"$or": [{"a": 5}, {"b": 3}]})).unwrap();

        let ranked = ranker.rank(&filter).unwrap();
        let solution = &ranked.winner.solution;
        assert_eq!(solution.node(solution.root()).stage, Stage::Or);
        assert_eq!(solution.index_names(), vec!["a_1", "b_1"]);
        assert!(ranked.rejected.is_empty());

        let estimates = ranked.winner.estimates.unwrap();
        // The OR root carries no estimate, the branches do.
        assert!(estimates.get(solution.root()).is_none());
        let branch = solution.node(solution.root()).children[0];
        assert!(estimates.get(branch).is_some_and(|e| e.cardinality > 0.0));
        assert_eq!(ranked.source, EstimateSource::Histogram);
    }

    #[test]
    fn test_unindexed_branch_falls_back_to_collscan() {
        let coll = collection();
        let snapshot = snapshot(&coll, &[]);
        let ranker = PlanRanker::new(&coll, &snapshot, RankerMode::HistogramCe);
        let filter = Parser::parse(&json!({"$or": [{"a": 5}, {"c": 3}]})).unwrap();

        let ranked = ranker.rank(&filter).unwrap();
        assert_eq!(ranked.winner.solution.summary(), "FILTER(COLLSCAN)");
        assert!(ranked.winner.estimates.is_none());
    }

    #[test]
    fn test_estimation_failure_is_masked_by_fallback() {
        let coll = collection();
        // No histogram on "a": strict branch ranking fails.
        let snapshot = snapshot(&coll, &["b"]);
        let ranker = PlanRanker::new(&coll, &snapshot, RankerMode::HistogramCe);
        let filter = Parser::parse(&json!({"$or": [{"a": 5}, {"b": 3}]})).unwrap();

        // The whole-query plan is the single OR solution, returned unranked.
        let ranked = ranker.rank(&filter).unwrap();
        assert_eq!(ranked.winner.solution.summary(), "FETCH(OR(IXSCAN a_1, IXSCAN b_1))");
        assert!(ranked.winner.estimates.is_none());
    }

    #[test]
    fn test_multi_planning_branches() {
        let coll = collection();
        let snapshot = snapshot(&coll, &[]);
        let ranker = PlanRanker::new(&coll, &snapshot, RankerMode::MultiPlanning);
        let filter = Parser::parse(&json!({"$or": [{"a": 5, "b": 5}, {"b": 3}]})).unwrap();

        let ranked = ranker.rank(&filter).unwrap();
        assert_eq!(ranked.source, EstimateSource::MultiPlanning);
        assert!(ranked.winner.estimates.is_none());
        assert_eq!(ranked.winner.solution.index_names().len(), 2);
    }
}
