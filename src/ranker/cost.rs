//! Plan cost estimation.
//!
//! Every node gets a cardinality (documents it outputs) and a cumulative
//! cost computed bottom-up. Index scans pay per estimated key examined,
//! fetches per document loaded, filters per document evaluated, and unions
//! per row merged. The root's cost ranks the plan.

use crate::ce::{
    conjunction_backoff, disjunction_backoff, CardinalityEstimator, CeResult, EstimateSource,
    EstimationContext, Selectivity,
};
use crate::planner::{NodeId, QuerySolution, Stage};
use crate::query::IntervalList;

/// Cost model constants.
mod cost {
    /// Fixed cost of opening any stage.
    pub const STARTUP: f64 = 1.0;
    /// Cost per document for a collection scan.
    pub const SEQ_SCAN_PER_DOC: f64 = 1.0;
    /// Cost per index key examined.
    pub const INDEX_SCAN_PER_KEY: f64 = 0.5;
    /// Cost per key range an index scan seeks to.
    pub const INDEX_SEEK: f64 = 2.0;
    /// Cost per full document retrieved by a fetch.
    pub const FETCH_PER_DOC: f64 = 3.0;
    /// Cost per document evaluated by a filter.
    pub const FILTER_PER_DOC: f64 = 0.1;
    /// Cost per row merged by a union.
    pub const OR_PER_ROW: f64 = 0.05;
}

/// Estimates attached to one plan node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeEstimate {
    pub cardinality: f64,
    pub cost: f64,
    pub source: EstimateSource,
}

/// Per-node estimates of one solution, indexed by node id.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEstimates {
    nodes: Vec<Option<NodeEstimate>>,
    source: EstimateSource,
}

impl PlanEstimates {
    /// Estimates for a solution of `len` nodes, none attached yet.
    pub(crate) fn empty(len: usize, source: EstimateSource) -> Self {
        Self {
            nodes: vec![None; len],
            source,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeEstimate> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn set(&mut self, id: NodeId, estimate: NodeEstimate) {
        if id.0 >= self.nodes.len() {
            self.nodes.resize(id.0 + 1, None);
        }
        self.nodes[id.0] = Some(estimate);
    }

    /// Which strategy produced the plan's estimates.
    pub fn source(&self) -> EstimateSource {
        self.source
    }

    pub(crate) fn set_source(&mut self, source: EstimateSource) {
        self.source = source;
    }

    /// Exact estimates for the collection scans of a solution ranked
    /// without an estimator. `None` if the solution has no collection scan.
    pub(crate) fn collection_scans(solution: &QuerySolution, count: f64) -> Option<Self> {
        let mut estimates = Self::empty(solution.len(), EstimateSource::MultiPlanning);
        let mut found = false;
        for id in solution.post_order() {
            if matches!(solution.node(id).stage, Stage::CollScan) {
                estimates.set(id, collscan_estimate(count));
                found = true;
            }
        }
        found.then_some(estimates)
    }

    /// Cost of the solution's root, if estimated.
    pub fn root_cost(&self, solution: &QuerySolution) -> Option<f64> {
        self.get(solution.root()).map(|e| e.cost)
    }
}

/// Derives cardinality and cost estimates for whole plans.
pub struct PlanCostEstimator<'a> {
    estimator: &'a dyn CardinalityEstimator,
    ctx: EstimationContext<'a>,
}

impl<'a> PlanCostEstimator<'a> {
    pub fn new(estimator: &'a dyn CardinalityEstimator, ctx: EstimationContext<'a>) -> Self {
        Self { estimator, ctx }
    }

    /// Estimate every node reachable from the root.
    pub fn estimate(&self, solution: &QuerySolution) -> CeResult<PlanEstimates> {
        let mut estimates = PlanEstimates::empty(solution.len(), self.estimator.source());
        let mut plan_source: Option<EstimateSource> = None;

        for id in solution.post_order() {
            let estimate = self.estimate_node(solution, id, &estimates)?;
            if estimate.source != EstimateSource::Metadata {
                plan_source = Some(plan_source.map_or(estimate.source, |s| s.merge(estimate.source)));
            }
            estimates.set(id, estimate);
        }

        if let Some(source) = plan_source {
            estimates.source = source;
        }
        Ok(estimates)
    }

    fn estimate_node(
        &self,
        solution: &QuerySolution,
        id: NodeId,
        done: &PlanEstimates,
    ) -> CeResult<NodeEstimate> {
        let node = solution.node(id);
        let children: Vec<NodeEstimate> = node
            .children
            .iter()
            .filter_map(|child| done.get(*child).copied())
            .collect();
        let n = self.ctx.cardinality;

        match &node.stage {
            Stage::CollScan => Ok(collscan_estimate(n)),

            Stage::IndexScan { bounds, .. } => {
                let keys = self.fields_cardinality(bounds.driving_fields())?;
                let output = self.fields_cardinality(bounds.fields())?;
                let seeks = bounds.key_ranges().len() as f64;
                Ok(NodeEstimate {
                    cardinality: output.0,
                    cost: cost::STARTUP + seeks * cost::INDEX_SEEK + keys.0 * cost::INDEX_SCAN_PER_KEY,
                    source: output.1,
                })
            }

            Stage::Fetch => {
                let input = first(&children);
                Ok(NodeEstimate {
                    cardinality: input.cardinality,
                    cost: input.cost + cost::STARTUP + input.cardinality * cost::FETCH_PER_DOC,
                    source: input.source,
                })
            }

            Stage::Filter { predicate } => {
                let input = first(&children);
                let s = self.estimator.selectivity(predicate, &self.ctx)?;
                let fraction = if n > 0.0 { input.cardinality / n } else { 0.0 };
                // Same combination rule as the index bounds, so a residual
                // filter and a compound index agree on the output.
                Ok(NodeEstimate {
                    cardinality: self.ctx.cardinality_of(conjunction_backoff(&[fraction, s.value])),
                    cost: input.cost + cost::STARTUP + input.cardinality * cost::FILTER_PER_DOC,
                    source: input.source.merge(s.source),
                })
            }

            Stage::Or => {
                let fractions: Vec<f64> = children
                    .iter()
                    .map(|c| if n > 0.0 { c.cardinality / n } else { 0.0 })
                    .collect();
                let rows: f64 = children.iter().map(|c| c.cardinality).sum();
                let source = children
                    .iter()
                    .map(|c| c.source)
                    .reduce(EstimateSource::merge)
                    .unwrap_or(EstimateSource::Metadata);
                Ok(NodeEstimate {
                    cardinality: self.ctx.cardinality_of(disjunction_backoff(&fractions)),
                    cost: children.iter().map(|c| c.cost).sum::<f64>()
                        + cost::STARTUP
                        + rows * cost::OR_PER_ROW,
                    source,
                })
            }
        }
    }

    /// Documents with keys inside every constrained field's intervals.
    fn fields_cardinality(&self, fields: &[(String, IntervalList)]) -> CeResult<(f64, EstimateSource)> {
        let parts = fields
            .iter()
            .filter(|(_, list)| !list.is_full())
            .map(|(field, list)| self.estimator.interval_selectivity(field, list, &self.ctx))
            .collect::<CeResult<Vec<Selectivity>>>()?;
        if parts.is_empty() {
            return Ok((self.ctx.cardinality, EstimateSource::Metadata));
        }
        let values: Vec<f64> = parts.iter().map(|p| p.value).collect();
        let source = parts
            .iter()
            .map(|p| p.source)
            .reduce(EstimateSource::merge)
            .unwrap_or(EstimateSource::Metadata);
        Ok((self.ctx.cardinality_of(conjunction_backoff(&values)), source))
    }
}

fn collscan_estimate(count: f64) -> NodeEstimate {
    NodeEstimate {
        cardinality: count,
        cost: cost::STARTUP + count * cost::SEQ_SCAN_PER_DOC,
        source: EstimateSource::Metadata,
    }
}

fn first(children: &[NodeEstimate]) -> NodeEstimate {
    children.first().copied().unwrap_or(NodeEstimate {
        cardinality: 0.0,
        cost: 0.0,
        source: EstimateSource::Metadata,
    })
}
