//! Plan execution.

use super::error::{ExecuteError, ExecuteResult};
use super::operators::{
    CollScanOperator, FetchOperator, FilterOperator, IndexScanOperator, Operator, OrOperator,
    StageState, StageStats,
};
use super::result::{ExecutionStats, ResultSet};
use crate::planner::{NodeId, QuerySolution, Stage};
use crate::storage::{Collection, RecordId};

/// Executes one query solution against a collection.
pub struct PlanExecutor<'a> {
    collection: &'a Collection,
    root: Box<dyn Operator + 'a>,
    results: Vec<RecordId>,
    eof: bool,
}

impl<'a> PlanExecutor<'a> {
    /// Build the stage tree for a solution.
    pub fn new(collection: &'a Collection, solution: &QuerySolution) -> ExecuteResult<Self> {
        if solution.is_empty() {
            return Err(ExecuteError::EmptyPlan);
        }
        let root = build(collection, solution, solution.root())?;
        Ok(Self {
            collection,
            root,
            results: Vec::new(),
            eof: false,
        })
    }

    /// Perform one unit of work on the root stage.
    pub fn work(&mut self) -> ExecuteResult<StageState> {
        if self.eof {
            return Ok(StageState::IsEof);
        }
        let state = self.root.work()?;
        match state {
            StageState::Advanced(member) => self.results.push(member.record_id),
            StageState::IsEof => self.eof = true,
            StageState::NeedTime => {}
        }
        Ok(state)
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Number of results produced so far.
    pub fn advanced(&self) -> usize {
        self.results.len()
    }

    /// Work until the plan is exhausted.
    pub fn run_to_completion(&mut self) -> ExecuteResult<()> {
        while !self.eof {
            self.work()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> ExecutionStats {
        ExecutionStats::from_stages(self.results.len() as u64, self.root.stats())
    }

    pub fn stage_stats(&self) -> StageStats {
        self.root.stats()
    }

    /// Documents produced so far.
    pub fn results(&self) -> ExecuteResult<ResultSet> {
        let mut set = ResultSet::default();
        for record_id in &self.results {
            let doc = self
                .collection
                .get(*record_id)
                .ok_or(ExecuteError::MissingRecord(*record_id))?;
            set.push(*record_id, doc.clone());
        }
        Ok(set)
    }
}

fn build<'a>(
    collection: &'a Collection,
    solution: &QuerySolution,
    id: NodeId,
) -> ExecuteResult<Box<dyn Operator + 'a>> {
    let node = solution.node(id);
    let mut children = node
        .children
        .iter()
        .map(|child| build(collection, solution, *child))
        .collect::<ExecuteResult<Vec<_>>>()?;

    let operator: Box<dyn Operator + 'a> = match &node.stage {
        Stage::CollScan => Box::new(CollScanOperator::new(collection)),
        Stage::IndexScan { index, bounds } => {
            let index = collection
                .index(&index.name)
                .ok_or_else(|| ExecuteError::IndexNotFound(index.name.clone()))?;
            Box::new(IndexScanOperator::new(index, bounds.clone()))
        }
        Stage::Fetch => Box::new(FetchOperator::new(single_child(&mut children)?, collection)),
        Stage::Filter { predicate } => Box::new(FilterOperator::new(
            single_child(&mut children)?,
            collection,
            predicate.clone(),
        )),
        Stage::Or => Box::new(OrOperator::new(children)),
    };
    Ok(operator)
}

fn single_child<'a>(children: &mut Vec<Box<dyn Operator + 'a>>) -> ExecuteResult<Box<dyn Operator + 'a>> {
    children.pop().ok_or(ExecuteError::EmptyPlan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::QueryPlanner;
    use crate::query::{Parser, Predicate};
    use crate::storage::CollectionName;
    use serde_json::json;

    fn collection() -> Collection {
        let mut coll = Collection::new(CollectionName::new("coll").unwrap());
        coll.insert_many((0..100).map(|i| json!({"a": i % 10, "b": i}))).unwrap();
        coll.create_index(vec!["a".into()]).unwrap();
        coll.create_index(vec!["b".into()]).unwrap();
        coll
    }

    #[test]
    fn test_every_plan_returns_same_documents() {
        let coll = collection();
        let filter = Parser::parse(&json!({"a": 3, "b": {"$lt": 50}})).unwrap();
        let plans = QueryPlanner::new(&coll).plan(&filter);
        assert_eq!(plans.len(), 2);

        let mut outputs = Vec::new();
        for plan in &plans {
            let mut exec = PlanExecutor::new(&coll, plan).unwrap();
            exec.run_to_completion().unwrap();
            let mut ids = exec.results().unwrap().record_ids;
            ids.sort();
            outputs.push(ids);
        }
        assert_eq!(outputs[0].len(), 5);
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn test_stats_totals() {
        let coll = collection();
        let filter = Parser::parse(&json!({"a": 3})).unwrap();
        let plans = QueryPlanner::new(&coll).plan(&filter);
        let mut exec = PlanExecutor::new(&coll, &plans[0]).unwrap();
        exec.run_to_completion().unwrap();

        let stats = exec.stats();
        assert_eq!(stats.n_returned, 10);
        assert_eq!(stats.total_keys_examined, 10);
        assert_eq!(stats.total_docs_examined, 10);
        assert_eq!(stats.execution_stages.stage, "FETCH");
    }

    #[test]
    fn test_missing_index() {
        let coll = collection();
        let filter = Parser::parse(&json!({"a": 3})).unwrap();
        let plans = QueryPlanner::new(&coll).plan(&filter);

        let bare = Collection::new(CollectionName::new("bare").unwrap());
        let err = PlanExecutor::new(&bare, &plans[0]).err();
        assert_eq!(err, Some(ExecuteError::IndexNotFound("a_1".into())));
    }

    #[test]
    fn test_collscan_without_filter() {
        let coll = collection();
        let plans = QueryPlanner::new(&coll).plan(&Predicate::always_true());
        let mut exec = PlanExecutor::new(&coll, &plans[0]).unwrap();
        exec.run_to_completion().unwrap();
        assert_eq!(exec.stats().n_returned, 100);
        assert!(exec.is_eof());
    }
}
