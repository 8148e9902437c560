//! Query planner - enumerates candidate solutions for a predicate.
//!
//! Candidates are generated in a fixed order: one index solution per index
//! (catalog order), then the `$or` solutions. A collection scan is only
//! produced when nothing indexed applies.

use tracing::debug;

use super::bounds::IndexBounds;
use super::error::{PlanError, PlanResult};
use super::physical::{NodeId, QuerySolution};
use crate::query::{is_sargable, leaf_intervals, IntervalList, Predicate};
use crate::storage::{Collection, Index, IndexDescriptor};

/// Default cap on the number of `$or` solutions per disjunction.
pub const DEFAULT_MAX_OR_SOLUTIONS: usize = 10;

/// How one index serves a set of conjuncts.
#[derive(Debug, Clone)]
struct IndexAccess {
    index: IndexDescriptor,
    bounds: IndexBounds,
    /// Conjuncts that are not answered by the bounds.
    residual: Predicate,
}

impl IndexAccess {
    /// `FILTER(residual)? -> FETCH -> IXSCAN`, or a bare `IXSCAN` when the
    /// caller fetches and there is nothing left to filter.
    fn build(&self, solution: &mut QuerySolution, fetch_always: bool) -> NodeId {
        let scan = solution.ixscan(self.index.clone(), self.bounds.clone());
        if !fetch_always && self.residual.is_trivially_true() {
            return scan;
        }
        let fetch = solution.fetch(scan);
        solution.filter(self.residual.clone(), fetch)
    }
}

/// The query planner.
pub struct QueryPlanner<'a> {
    collection: &'a Collection,
    max_or_solutions: usize,
}

impl<'a> QueryPlanner<'a> {
    /// Create a planner over a collection's indexes.
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            max_or_solutions: DEFAULT_MAX_OR_SOLUTIONS,
        }
    }

    pub fn with_max_or_solutions(mut self, max: usize) -> Self {
        self.max_or_solutions = max.max(1);
        self
    }

    /// All candidate solutions for a predicate. Never empty.
    pub fn plan(&self, predicate: &Predicate) -> Vec<QuerySolution> {
        let mut solutions = self.indexed_solutions(predicate);
        if solutions.is_empty() {
            let mut solution = QuerySolution::new();
            let scan = solution.collscan();
            let root = solution.filter(predicate.clone(), scan);
            solution.set_root(root);
            solutions.push(solution);
        }
        debug!(
            collection = %self.collection.name(),
            candidates = solutions.len(),
            "enumerated solutions"
        );
        solutions
    }

    /// Solutions for each branch of a rooted `$or`, planned independently.
    /// Fails when a branch has no indexed solution.
    pub fn plan_branches(&self, predicate: &Predicate) -> PlanResult<Vec<Vec<QuerySolution>>> {
        let Predicate::Or(branches) = predicate else {
            return Err(PlanError::NotRootedOr);
        };
        branches
            .iter()
            .enumerate()
            .map(|(i, branch)| {
                let solutions = self.indexed_solutions(branch);
                if solutions.is_empty() {
                    Err(PlanError::BranchNotIndexed(i))
                } else {
                    Ok(solutions)
                }
            })
            .collect()
    }

    /// Index solutions followed by `$or` solutions.
    fn indexed_solutions(&self, predicate: &Predicate) -> Vec<QuerySolution> {
        let conjuncts = predicate.conjuncts();
        let mut solutions = Vec::new();

        for index in self.collection.indexes() {
            if let Some(access) = Self::index_access(index, &conjuncts) {
                let mut solution = QuerySolution::new();
                let root = access.build(&mut solution, true);
                solution.set_root(root);
                solutions.push(solution);
            }
        }

        for (position, conjunct) in conjuncts.iter().enumerate() {
            if let Predicate::Or(branches) = conjunct {
                solutions.extend(self.or_solutions(&conjuncts, position, branches));
            }
        }

        solutions
    }

    /// Bounds for `index` from the sargable conjuncts, if its leading field
    /// is constrained. Multikey indexes take a single predicate on their
    /// leading field and nothing on later fields.
    fn index_access(index: &Index, conjuncts: &[&Predicate]) -> Option<IndexAccess> {
        let descriptor = index.descriptor();
        let multikey = index.is_multikey();
        let mut used = vec![false; conjuncts.len()];
        let mut fields = Vec::with_capacity(descriptor.key_pattern.len());

        for (position, field) in descriptor.key_pattern.iter().enumerate() {
            let mut list = IntervalList::full();
            if !(multikey && position > 0) {
                for (i, conjunct) in conjuncts.iter().enumerate() {
                    if conjunct.field() != Some(field.as_str()) || !is_sargable(conjunct) {
                        continue;
                    }
                    if let Some(intervals) = leaf_intervals(conjunct) {
                        list = list.intersect(&intervals);
                        used[i] = true;
                        if multikey {
                            break;
                        }
                    }
                }
            }
            if position == 0 && !used.iter().any(|u| *u) {
                return None;
            }
            fields.push((field.clone(), list));
        }

        let residual = conjuncts
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(c, _)| (*c).clone())
            .collect();

        Some(IndexAccess {
            index: descriptor.clone(),
            bounds: IndexBounds::new(fields),
            residual: Predicate::and(residual),
        })
    }

    /// `FILTER(other conjuncts)? -> FETCH -> OR[branches]` for every
    /// combination of branch index choices, up to the configured cap.
    fn or_solutions(
        &self,
        conjuncts: &[&Predicate],
        position: usize,
        branches: &[Predicate],
    ) -> Vec<QuerySolution> {
        let mut choices: Vec<Vec<IndexAccess>> = Vec::with_capacity(branches.len());
        for branch in branches {
            let branch_conjuncts = branch.conjuncts();
            let options: Vec<IndexAccess> = self
                .collection
                .indexes()
                .iter()
                .filter_map(|index| Self::index_access(index, &branch_conjuncts))
                .collect();
            if options.is_empty() {
                return Vec::new();
            }
            choices.push(options);
        }

        let others = Predicate::and(
            conjuncts
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != position)
                .map(|(_, c)| (*c).clone())
                .collect(),
        );

        let mut solutions = Vec::new();
        let mut selection = vec![0usize; choices.len()];
        loop {
            let mut solution = QuerySolution::new();
            let children = selection
                .iter()
                .zip(&choices)
                .map(|(pick, options)| options[*pick].build(&mut solution, false))
                .collect();
            let or = solution.or(children);
            let fetch = solution.fetch(or);
            let root = solution.filter(others.clone(), fetch);
            solution.set_root(root);
            solutions.push(solution);

            if solutions.len() >= self.max_or_solutions || !advance(&mut selection, &choices) {
                break;
            }
        }
        solutions
    }
}

/// Step an odometer over the choices, last branch fastest. Returns false
/// once every combination has been produced.
fn advance(selection: &mut [usize], choices: &[Vec<IndexAccess>]) -> bool {
    for i in (0..selection.len()).rev() {
        selection[i] += 1;
        if selection[i] < choices[i].len() {
            return true;
        }
        selection[i] = 0;
    }
    false
}
