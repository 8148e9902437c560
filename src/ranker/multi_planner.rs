//! Execution-based ranking.
//!
//! Every candidate runs round-robin, one unit of work per round, until one
//! of them finishes, one of them has produced a batch of results, or the
//! work budget is spent. The candidate that produced the most per unit of
//! work wins.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cost::PlanEstimates;
use super::error::{RankError, RankResult};
use super::{RankedPlan, RankedPlanSet, RankerMode};
use crate::executor::{PlanExecutor, StageState};
use crate::planner::{QuerySolution, Stage};
use crate::storage::Collection;

mod bonus {
    /// Added to the score of a plan that finished during the trial.
    pub const EOF: f64 = 1.0;
    /// Upper bound of the bonus for plans that never fetch.
    pub const NO_FETCH: f64 = 1e-4;
}

/// Limits of the trial period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Minimum number of rounds before giving up.
    pub max_works: u64,
    /// Fraction of the collection size that raises the round limit.
    pub collection_fraction: f64,
    /// Results after which a plan ends the trial.
    pub max_results: usize,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            max_works: 10_000,
            collection_fraction: 0.29,
            max_results: 101,
        }
    }
}

impl TrialConfig {
    fn round_limit(&self, documents: usize) -> u64 {
        let scaled = (self.collection_fraction * documents as f64).ceil() as u64;
        self.max_works.max(scaled).max(1)
    }
}

/// Progress of one candidate at the end of the trial.
#[derive(Debug, Clone, Copy)]
struct TrialOutcome {
    advanced: usize,
    works: u64,
    eof: bool,
}

impl TrialOutcome {
    fn score(&self, fetches: bool) -> f64 {
        let works = self.works.max(1) as f64;
        let mut score = 1.0 + self.advanced as f64 / works;
        if self.eof {
            score += bonus::EOF;
        }
        if !fetches {
            score += (1.0 / (10.0 * works)).min(bonus::NO_FETCH);
        }
        score
    }
}

/// Ranks candidates by running them.
pub struct MultiPlanner<'a> {
    collection: &'a Collection,
    config: TrialConfig,
}

impl<'a> MultiPlanner<'a> {
    pub fn new(collection: &'a Collection, config: TrialConfig) -> Self {
        Self { collection, config }
    }

    /// Run the trial and rank. A single candidate wins without a trial.
    /// On equal scores the candidate generated first wins.
    pub fn rank(&self, candidates: Vec<QuerySolution>) -> RankResult<RankedPlanSet> {
        if candidates.is_empty() {
            return Err(RankError::NoCandidates);
        }
        if candidates.len() == 1 {
            let plans = candidates
                .into_iter()
                .map(|solution| RankedPlan {
                    estimates: self.scan_estimates(&solution),
                    solution,
                    score: None,
                })
                .collect();
            return RankedPlanSet::from_candidates(plans, 0, RankerMode::MultiPlanning);
        }

        let outcomes = self.run_trial(&candidates)?;
        let mut best: Option<(usize, f64)> = None;
        let mut plans = Vec::with_capacity(candidates.len());
        for (i, (solution, outcome)) in candidates.into_iter().zip(outcomes).enumerate() {
            let score = outcome.score(fetches(&solution));
            debug!(
                plan = i,
                score,
                works = outcome.works,
                advanced = outcome.advanced,
                eof = outcome.eof,
                shape = %solution.summary(),
                "trial finished"
            );
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
            plans.push(RankedPlan {
                estimates: self.scan_estimates(&solution),
                solution,
                score: Some(score),
            });
        }

        let (winner, score) = best.ok_or(RankError::NoCandidates)?;
        debug!(winner, score, "multi-planning done");
        RankedPlanSet::from_candidates(plans, winner, RankerMode::MultiPlanning)
    }

    /// Collection scans report the exact document count even without an
    /// estimator.
    fn scan_estimates(&self, solution: &QuerySolution) -> Option<PlanEstimates> {
        PlanEstimates::collection_scans(solution, self.collection.count() as f64)
    }

    fn run_trial(&self, candidates: &[QuerySolution]) -> RankResult<Vec<TrialOutcome>> {
        let mut executors = candidates
            .iter()
            .map(|solution| PlanExecutor::new(self.collection, solution))
            .collect::<Result<Vec<_>, _>>()?;
        let limit = self.config.round_limit(self.collection.count());

        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut done = false;
            for executor in executors.iter_mut().filter(|e| !e.is_eof()) {
                if executor.work()? == StageState::IsEof {
                    done = true;
                }
                if executor.advanced() >= self.config.max_results {
                    done = true;
                }
            }
            if done || rounds >= limit {
                break;
            }
        }

        Ok(executors
            .iter()
            .map(|e| TrialOutcome {
                advanced: e.advanced(),
                works: e.stage_stats().works,
                eof: e.is_eof(),
            })
            .collect())
    }
}

fn fetches(solution: &QuerySolution) -> bool {
    solution
        .post_order()
        .into_iter()
        .any(|id| matches!(solution.node(id).stage, Stage::Fetch | Stage::CollScan))
}
