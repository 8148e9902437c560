//! Query result types.

use serde::Serialize;
use serde_json::Value;

use super::operators::StageStats;
use crate::storage::RecordId;

/// Summary of a complete plan execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub n_returned: u64,
    pub total_keys_examined: u64,
    pub total_docs_examined: u64,
    pub execution_stages: StageStats,
}

impl ExecutionStats {
    pub(crate) fn from_stages(n_returned: u64, stages: StageStats) -> Self {
        Self {
            n_returned,
            total_keys_examined: stages.total_keys_examined(),
            total_docs_examined: stages.total_docs_examined(),
            execution_stages: stages,
        }
    }
}

/// Documents returned by a query, in plan output order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub record_ids: Vec<RecordId>,
    pub documents: Vec<Value>,
}

impl ResultSet {
    /// Add a document.
    pub fn push(&mut self, record_id: RecordId, doc: Value) {
        self.record_ids.push(record_id);
        self.documents.push(doc);
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate over documents.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.documents.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}
