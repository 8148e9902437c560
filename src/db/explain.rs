//! Explain documents.

use serde_json::{json, Map, Value};

use crate::ce::EstimateSource;
use crate::executor::ExecutionStats;
use crate::planner::{NodeId, QuerySolution, Stage};
use crate::query::Predicate;
use crate::ranker::{PlanEstimates, RankedPlan, RankedPlanSet};

/// How much an explain reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Plans and estimates only.
    #[default]
    QueryPlanner,
    /// Also run the winning plan and report its execution statistics.
    ExecutionStats,
}

/// Build the explain document for a ranked query.
pub fn explain_document(
    namespace: &str,
    parsed_query: &Predicate,
    ranked: &RankedPlanSet,
    execution: Option<&ExecutionStats>,
) -> serde_json::Result<Value> {
    let rejected: Vec<Value> = ranked
        .rejected
        .iter()
        .map(|plan| plan_json(plan, plan.estimates.as_ref().map(PlanEstimates::source)))
        .collect();

    let mut doc = json!({
        "queryPlanner": {
            "namespace": namespace,
            "parsedQuery": parsed_query.to_json(),
            "planRankerMode": ranked.mode.as_str(),
            "winningPlan": plan_json(&ranked.winner, Some(ranked.source)),
            "rejectedPlans": rejected,
        }
    });
    if let (Some(stats), Value::Object(map)) = (execution, &mut doc) {
        map.insert("executionStats".to_string(), serde_json::to_value(stats)?);
    }
    Ok(doc)
}

fn plan_json(plan: &RankedPlan, source: Option<EstimateSource>) -> Value {
    let solution = &plan.solution;
    let mut root = node_json(solution, solution.root(), plan.estimates.as_ref());
    if let (Some(source), Value::Object(map)) = (source, &mut root) {
        map.insert("estimatesMetadata".to_string(), json!({ "ceSource": source.as_str() }));
    }
    root
}

fn node_json(solution: &QuerySolution, id: NodeId, estimates: Option<&PlanEstimates>) -> Value {
    let node = solution.node(id);
    let mut map = Map::new();
    map.insert("stage".to_string(), json!(node.stage.name()));

    match &node.stage {
        Stage::IndexScan { index, bounds } => {
            let key_pattern: Map<String, Value> = index
                .key_pattern
                .iter()
                .map(|field| (field.clone(), json!(1)))
                .collect();
            map.insert("indexName".to_string(), json!(index.name));
            map.insert("keyPattern".to_string(), Value::Object(key_pattern));
            map.insert("indexBounds".to_string(), bounds.to_json());
        }
        Stage::Filter { predicate } => {
            map.insert("filter".to_string(), predicate.to_json());
        }
        Stage::CollScan | Stage::Fetch | Stage::Or => {}
    }

    if let Some(estimate) = estimates.and_then(|e| e.get(id)) {
        map.insert("cardinalityEstimate".to_string(), json!(estimate.cardinality));
        map.insert("costEstimate".to_string(), json!(estimate.cost));
    }

    let children: Vec<Value> = node
        .children
        .iter()
        .map(|child| node_json(solution, *child, estimates))
        .collect();
    match node.stage {
        Stage::Or => {
            map.insert("inputStages".to_string(), Value::Array(children));
        }
        _ => {
            if let Some(child) = children.into_iter().next() {
                map.insert("inputStage".to_string(), child);
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Parser;
    use crate::ranker::{PlanRanker, RankerMode};
    use crate::stats::HistogramSnapshot;
    use crate::storage::{Collection, CollectionName};

    fn collection() -> Collection {
        let mut coll = Collection::new(CollectionName::new("coll").unwrap());
        coll.insert_many((0..50).map(|i| json!({"a": i, "b": i % 5}))).unwrap();
        coll.create_index(vec!["a".into(), "b".into()]).unwrap();
        coll.create_index(vec!["b".into()]).unwrap();
        coll
    }

    #[test]
    fn test_cost_based_explain_shape() {
        let coll = collection();
        let snapshot = HistogramSnapshot::default();
        let filter = Parser::parse(&json!({"a": {"$gte": 10}, "b": 2})).unwrap();
        let ranked = PlanRanker::new(&coll, &snapshot, RankerMode::HeuristicCe)
            .rank(&filter)
            .unwrap();

        let doc = explain_document("test.coll", &filter, &ranked, None).unwrap();
        let planner = &doc["queryPlanner"];
        assert_eq!(planner["namespace"], "test.coll");
        assert_eq!(planner["planRankerMode"], "heuristicCE");
        assert_eq!(planner["winningPlan"]["estimatesMetadata"]["ceSource"], "Heuristics");
        assert!(planner["winningPlan"]["cardinalityEstimate"].as_f64().unwrap() > 0.0);
        assert!(planner["winningPlan"]["inputStage"]["costEstimate"].as_f64().unwrap() > 0.0);
        assert_eq!(planner["rejectedPlans"].as_array().unwrap().len(), 1);
        assert!(doc.get("executionStats").is_none());
    }

    #[test]
    fn test_index_scan_fields() {
        let coll = collection();
        let snapshot = HistogramSnapshot::default();
        let filter = Parser::parse(&json!({"a": 7})).unwrap();
        let ranked = PlanRanker::new(&coll, &snapshot, RankerMode::HeuristicCe)
            .rank(&filter)
            .unwrap();

        let doc = explain_document("test.coll", &filter, &ranked, None).unwrap();
        let winning = &doc["queryPlanner"]["winningPlan"];
        assert_eq!(winning["stage"], "FETCH");
        let scan = &winning["inputStage"];
        assert_eq!(scan["stage"], "IXSCAN");
        assert_eq!(scan["indexName"], "a_1_b_1");
        assert_eq!(scan["keyPattern"], json!({"a": 1, "b": 1}));
        assert!(scan["indexBounds"].get("a").is_some());
    }

    #[test]
    fn test_multi_planning_has_no_estimates() {
        let coll = collection();
        let snapshot = HistogramSnapshot::default();
        let filter = Parser::parse(&json!({"a": {"$gte": 10}, "b": 2})).unwrap();
        let ranked = PlanRanker::new(&coll, &snapshot, RankerMode::MultiPlanning)
            .rank(&filter)
            .unwrap();

        let doc = explain_document("test.coll", &filter, &ranked, None).unwrap();
        let winning = &doc["queryPlanner"]["winningPlan"];
        assert!(winning.get("cardinalityEstimate").is_none());
        assert_eq!(winning["estimatesMetadata"]["ceSource"], "MultiPlanning");
        let rejected = &doc["queryPlanner"]["rejectedPlans"][0];
        assert!(rejected.get("estimatesMetadata").is_none());
    }
}
