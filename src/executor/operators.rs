//! Work-unit stages for plan execution.
//!
//! Each call to `work` performs one unit of work and reports whether it
//! produced a result, needs more time, or is exhausted. Counting work
//! units is what lets the multi-planner compare candidates fairly.

use std::collections::HashSet;

use serde::Serialize;

use super::error::{ExecuteError, ExecuteResult};
use super::eval::matches;
use crate::planner::IndexBounds;
use crate::query::Predicate;
use crate::storage::{Collection, Index, IndexEntry, KeyRange, RecordId};

/// A result flowing between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingMember {
    pub record_id: RecordId,
    /// Whether the document has been loaded already.
    pub fetched: bool,
}

/// Outcome of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Advanced(WorkingMember),
    NeedTime,
    IsEof,
}

/// Execution statistics of one stage and its inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStats {
    pub stage: &'static str,
    pub works: u64,
    pub advanced: u64,
    pub keys_examined: u64,
    pub docs_examined: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(rename = "inputStages", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StageStats>,
}

impl StageStats {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    pub fn total_keys_examined(&self) -> u64 {
        self.keys_examined + self.children.iter().map(|c| c.total_keys_examined()).sum::<u64>()
    }

    pub fn total_docs_examined(&self) -> u64 {
        self.docs_examined + self.children.iter().map(|c| c.total_docs_examined()).sum::<u64>()
    }
}

/// Trait for all execution stages.
pub trait Operator {
    /// Perform one unit of work.
    fn work(&mut self) -> ExecuteResult<StageState>;

    /// Statistics for this stage and its children.
    fn stats(&self) -> StageStats;
}

/// Full scan in record id order.
pub struct CollScanOperator<'a> {
    collection: &'a Collection,
    position: usize,
    stats: StageStats,
}

impl<'a> CollScanOperator<'a> {
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            position: 0,
            stats: StageStats::new("COLLSCAN"),
        }
    }
}

impl Operator for CollScanOperator<'_> {
    fn work(&mut self) -> ExecuteResult<StageState> {
        self.stats.works += 1;
        if self.position >= self.collection.count() {
            return Ok(StageState::IsEof);
        }
        let record_id = RecordId(self.position as u64);
        self.position += 1;
        self.stats.docs_examined += 1;
        self.stats.advanced += 1;
        Ok(StageState::Advanced(WorkingMember {
            record_id,
            fetched: true,
        }))
    }

    fn stats(&self) -> StageStats {
        self.stats.clone()
    }
}

/// Index scan over the key ranges of a set of bounds. Examines one key per
/// unit of work.
pub struct IndexScanOperator<'a> {
    index: &'a Index,
    bounds: IndexBounds,
    ranges: Vec<KeyRange>,
    range: usize,
    last: Option<IndexEntry>,
    seen: HashSet<RecordId>,
    stats: StageStats,
}

impl<'a> IndexScanOperator<'a> {
    pub fn new(index: &'a Index, bounds: IndexBounds) -> Self {
        let mut stats = StageStats::new("IXSCAN");
        stats.index_name = Some(index.descriptor().name.clone());
        Self {
            index,
            ranges: bounds.key_ranges(),
            bounds,
            range: 0,
            last: None,
            seen: HashSet::new(),
            stats,
        }
    }
}

impl Operator for IndexScanOperator<'_> {
    fn work(&mut self) -> ExecuteResult<StageState> {
        self.stats.works += 1;
        loop {
            let Some(range) = self.ranges.get(self.range) else {
                return Ok(StageState::IsEof);
            };
            let Some(entry) = self.index.next_entry(self.last.as_ref(), range) else {
                self.range += 1;
                self.last = None;
                continue;
            };

            self.stats.keys_examined += 1;
            self.last = Some(entry.clone());
            let (key, record_id) = entry;

            if !self.bounds.matches(key) || !self.seen.insert(*record_id) {
                return Ok(StageState::NeedTime);
            }
            self.stats.advanced += 1;
            return Ok(StageState::Advanced(WorkingMember {
                record_id: *record_id,
                fetched: false,
            }));
        }
    }

    fn stats(&self) -> StageStats {
        self.stats.clone()
    }
}

/// Loads the documents of its input.
pub struct FetchOperator<'a> {
    source: Box<dyn Operator + 'a>,
    collection: &'a Collection,
    stats: StageStats,
}

impl<'a> FetchOperator<'a> {
    pub fn new(source: Box<dyn Operator + 'a>, collection: &'a Collection) -> Self {
        Self {
            source,
            collection,
            stats: StageStats::new("FETCH"),
        }
    }
}

impl Operator for FetchOperator<'_> {
    fn work(&mut self) -> ExecuteResult<StageState> {
        self.stats.works += 1;
        match self.source.work()? {
            StageState::Advanced(mut member) => {
                if !member.fetched {
                    self.collection
                        .get(member.record_id)
                        .ok_or(ExecuteError::MissingRecord(member.record_id))?;
                    self.stats.docs_examined += 1;
                    member.fetched = true;
                }
                self.stats.advanced += 1;
                Ok(StageState::Advanced(member))
            }
            other => Ok(other),
        }
    }

    fn stats(&self) -> StageStats {
        let mut stats = self.stats.clone();
        stats.children = vec![self.source.stats()];
        stats
    }
}

/// Drops documents that do not match a predicate.
pub struct FilterOperator<'a> {
    source: Box<dyn Operator + 'a>,
    collection: &'a Collection,
    predicate: Predicate,
    stats: StageStats,
}

impl<'a> FilterOperator<'a> {
    pub fn new(source: Box<dyn Operator + 'a>, collection: &'a Collection, predicate: Predicate) -> Self {
        Self {
            source,
            collection,
            predicate,
            stats: StageStats::new("FILTER"),
        }
    }
}

impl Operator for FilterOperator<'_> {
    fn work(&mut self) -> ExecuteResult<StageState> {
        self.stats.works += 1;
        match self.source.work()? {
            StageState::Advanced(member) => {
                let doc = self
                    .collection
                    .get(member.record_id)
                    .ok_or(ExecuteError::MissingRecord(member.record_id))?;
                if matches(&self.predicate, doc) {
                    self.stats.advanced += 1;
                    Ok(StageState::Advanced(member))
                } else {
                    Ok(StageState::NeedTime)
                }
            }
            other => Ok(other),
        }
    }

    fn stats(&self) -> StageStats {
        let mut stats = self.stats.clone();
        stats.children = vec![self.source.stats()];
        stats
    }
}

/// Runs its inputs one after another, deduplicating record ids.
pub struct OrOperator<'a> {
    sources: Vec<Box<dyn Operator + 'a>>,
    current: usize,
    seen: HashSet<RecordId>,
    stats: StageStats,
}

impl<'a> OrOperator<'a> {
    pub fn new(sources: Vec<Box<dyn Operator + 'a>>) -> Self {
        Self {
            sources,
            current: 0,
            seen: HashSet::new(),
            stats: StageStats::new("OR"),
        }
    }
}

impl Operator for OrOperator<'_> {
    fn work(&mut self) -> ExecuteResult<StageState> {
        self.stats.works += 1;
        let Some(source) = self.sources.get_mut(self.current) else {
            return Ok(StageState::IsEof);
        };
        match source.work()? {
            StageState::Advanced(member) => {
                if self.seen.insert(member.record_id) {
                    self.stats.advanced += 1;
                    Ok(StageState::Advanced(member))
                } else {
                    Ok(StageState::NeedTime)
                }
            }
            StageState::NeedTime => Ok(StageState::NeedTime),
            StageState::IsEof => {
                self.current += 1;
                if self.current >= self.sources.len() {
                    Ok(StageState::IsEof)
                } else {
                    Ok(StageState::NeedTime)
                }
            }
        }
    }

    fn stats(&self) -> StageStats {
        let mut stats = self.stats.clone();
        stats.children = self.sources.iter().map(|s| s.stats()).collect();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::IntervalList;
    use crate::query::KeyValue;
    use crate::storage::CollectionName;
    use serde_json::json;

    fn collection() -> Collection {
        let mut coll = Collection::new(CollectionName::new("coll").unwrap());
        coll.insert_many((0..10).map(|i| json!({"a": i, "b": i % 2}))).unwrap();
        coll.create_index(vec!["a".into()]).unwrap();
        coll
    }

    fn drain(op: &mut dyn Operator) -> Vec<RecordId> {
        let mut out = Vec::new();
        loop {
            match op.work().unwrap() {
                StageState::Advanced(m) => out.push(m.record_id),
                StageState::NeedTime => {}
                StageState::IsEof => return out,
            }
        }
    }

    fn points(values: &[f64]) -> IndexBounds {
        IndexBounds::new(vec![(
            "a".into(),
            IntervalList::points(values.iter().map(|v| KeyValue::Number(*v))),
        )])
    }

    #[test]
    fn test_collscan_counts_docs() {
        let coll = collection();
        let mut scan = CollScanOperator::new(&coll);
        assert_eq!(drain(&mut scan).len(), 10);
        let stats = scan.stats();
        assert_eq!(stats.works, 11);
        assert_eq!(stats.docs_examined, 10);
    }

    #[test]
    fn test_ixscan_fetch_filter() {
        let coll = collection();
        let index = coll.index("a_1").unwrap();
        let scan = IndexScanOperator::new(index, points(&[2.0, 3.0, 4.0]));
        let fetch = FetchOperator::new(Box::new(scan), &coll);
        let predicate = Predicate::Comparison {
            field: "b".into(),
            op: crate::query::ComparisonOp::Eq,
            value: json!(0),
        };
        let mut filter = FilterOperator::new(Box::new(fetch), &coll, predicate);

        assert_eq!(drain(&mut filter), vec![RecordId(2), RecordId(4)]);
        let stats = filter.stats();
        assert_eq!(stats.total_keys_examined(), 3);
        assert_eq!(stats.total_docs_examined(), 3);
        assert_eq!(stats.works, 4);
        assert_eq!(stats.advanced, 2);
    }

    #[test]
    fn test_or_deduplicates() {
        let coll = collection();
        let index = coll.index("a_1").unwrap();
        let left = IndexScanOperator::new(index, points(&[1.0, 2.0]));
        let right = IndexScanOperator::new(index, points(&[2.0, 3.0]));
        let mut or = OrOperator::new(vec![Box::new(left), Box::new(right)]);

        assert_eq!(drain(&mut or), vec![RecordId(1), RecordId(2), RecordId(3)]);
        let stats = or.stats();
        assert_eq!(stats.children.len(), 2);
        assert_eq!(stats.total_keys_examined(), 4);
        // 2 + 2 results, one duplicate, one switch and the final EOF.
        assert_eq!(stats.works, 6);
    }

    #[test]
    fn test_fetch_skips_fetched_members() {
        let coll = collection();
        let mut fetch = FetchOperator::new(Box::new(CollScanOperator::new(&coll)), &coll);
        drain(&mut fetch);
        assert_eq!(fetch.stats().total_docs_examined(), 10);
    }
}
