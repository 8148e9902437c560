//! Plan ranking.
//!
//! The ranker turns a predicate into a [`RankedPlanSet`]: it enumerates
//! candidates with the query planner and picks a winner according to the
//! active [`RankerMode`].
//!
//! - Execution-based ranking ([`MultiPlanner`]) runs the candidates for a
//!   trial period.
//! - Cost-based ranking ([`CostBasedRanker`]) estimates a cardinality and a
//!   cost for every node of every candidate and keeps the cheapest.
//! - Predicates rooted at `$or` go through the [`SubqueryPlanner`], which
//!   ranks each branch separately.

mod cbr;
mod cost;
mod error;
mod mode;
mod multi_planner;
mod subplanner;

pub use cbr::CostBasedRanker;
pub use cost::{NodeEstimate, PlanCostEstimator, PlanEstimates};
pub use error::{RankError, RankResult};
pub use mode::{RankerMode, UnknownModeError};
pub use multi_planner::{MultiPlanner, TrialConfig};
pub use subplanner::SubqueryPlanner;

use tracing::debug;

use crate::ce::{EstimateSource, EstimationContext};
use crate::planner::{QueryPlanner, QuerySolution, DEFAULT_MAX_OR_SOLUTIONS};
use crate::query::Predicate;
use crate::stats::HistogramSnapshot;
use crate::storage::Collection;

/// A candidate plan with whatever its ranking attached to it.
#[derive(Debug, Clone)]
pub struct RankedPlan {
    pub solution: QuerySolution,
    /// Per-node estimates, under cost-based ranking.
    pub estimates: Option<PlanEstimates>,
    /// Root cost or trial score, depending on the mode.
    pub score: Option<f64>,
}

/// The winner of one ranking and the rejected candidates in generation
/// order.
#[derive(Debug, Clone)]
pub struct RankedPlanSet {
    pub winner: RankedPlan,
    pub rejected: Vec<RankedPlan>,
    pub mode: RankerMode,
    /// Which strategy produced the winner's estimates.
    pub source: EstimateSource,
}

impl RankedPlanSet {
    pub(crate) fn from_candidates(
        mut plans: Vec<RankedPlan>,
        winner: usize,
        mode: RankerMode,
    ) -> RankResult<Self> {
        if winner >= plans.len() {
            return Err(RankError::NoCandidates);
        }
        let chosen = plans.remove(winner);
        let source = match &chosen.estimates {
            Some(estimates) => estimates.source(),
            None => primary_source(mode),
        };
        Ok(Self {
            winner: chosen,
            rejected: plans,
            mode,
            source,
        })
    }

    /// Number of candidates that were ranked.
    pub fn candidate_count(&self) -> usize {
        self.rejected.len() + 1
    }
}

fn primary_source(mode: RankerMode) -> EstimateSource {
    match mode.estimator() {
        Some(estimator) => estimator.source(),
        None => EstimateSource::MultiPlanning,
    }
}

/// Ranks the candidate plans of one collection under one mode.
pub struct PlanRanker<'a> {
    collection: &'a Collection,
    histograms: &'a HistogramSnapshot,
    mode: RankerMode,
    trial: TrialConfig,
    max_or_solutions: usize,
}

impl<'a> PlanRanker<'a> {
    pub fn new(collection: &'a Collection, histograms: &'a HistogramSnapshot, mode: RankerMode) -> Self {
        Self {
            collection,
            histograms,
            mode,
            trial: TrialConfig::default(),
            max_or_solutions: DEFAULT_MAX_OR_SOLUTIONS,
        }
    }

    pub fn with_trial_config(mut self, trial: TrialConfig) -> Self {
        self.trial = trial;
        self
    }

    pub fn with_max_or_solutions(mut self, max: usize) -> Self {
        self.max_or_solutions = max;
        self
    }

    pub fn mode(&self) -> RankerMode {
        self.mode
    }

    pub(crate) fn planner(&self) -> QueryPlanner<'a> {
        QueryPlanner::new(self.collection).with_max_or_solutions(self.max_or_solutions)
    }

    pub(crate) fn primary_source(&self) -> EstimateSource {
        primary_source(self.mode)
    }

    /// Enumerate and rank the plans for a predicate.
    pub fn rank(&self, predicate: &Predicate) -> RankResult<RankedPlanSet> {
        if predicate.is_rooted_or() {
            debug!(mode = %self.mode, "planning rooted $or by branch");
            return SubqueryPlanner::new(self).plan(predicate);
        }
        self.rank_candidates(self.planner().plan(predicate))
    }

    /// Rank already enumerated candidates.
    pub fn rank_candidates(&self, candidates: Vec<QuerySolution>) -> RankResult<RankedPlanSet> {
        let Some(estimator) = self.mode.estimator() else {
            return MultiPlanner::new(self.collection, self.trial).rank(candidates);
        };
        let ctx = EstimationContext::new(
            self.collection.name().as_str(),
            self.collection.count() as f64,
            self.histograms,
        );
        CostBasedRanker::new(estimator.as_ref(), ctx, self.mode).rank(candidates)
    }
}
