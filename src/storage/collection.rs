//! In-memory document collections.

use serde_json::Value;
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::index::{Index, IndexDescriptor};
use super::types::{CollectionName, RecordId};

/// A collection of JSON documents with its secondary indexes.
#[derive(Debug, Clone)]
pub struct Collection {
    name: CollectionName,
    documents: Vec<Value>,
    indexes: Vec<Index>,
}

impl Collection {
    pub fn new(name: CollectionName) -> Self {
        Self {
            name,
            documents: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn name(&self) -> &CollectionName {
        &self.name
    }

    /// Exact number of documents.
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    /// Insert a document, maintaining every index.
    pub fn insert(&mut self, doc: Value) -> StorageResult<RecordId> {
        if !doc.is_object() {
            return Err(StorageError::InvalidDocument(format!(
                "expected an object, got {}",
                doc
            )));
        }
        let record_id = RecordId(self.documents.len() as u64);
        for index in &mut self.indexes {
            index.insert(record_id, &doc);
        }
        self.documents.push(doc);
        Ok(record_id)
    }

    /// Insert several documents. Stops at the first invalid one.
    pub fn insert_many(&mut self, docs: impl IntoIterator<Item = Value>) -> StorageResult<usize> {
        let mut inserted = 0;
        for doc in docs {
            self.insert(doc)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    pub fn get(&self, record_id: RecordId) -> Option<&Value> {
        self.documents.get(record_id.index())
    }

    /// Iterate over documents in record id order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Value)> {
        self.documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (RecordId(i as u64), doc))
    }

    /// Build a new index over existing documents.
    pub fn create_index(&mut self, key_pattern: Vec<String>) -> StorageResult<&IndexDescriptor> {
        if key_pattern.is_empty() || key_pattern.iter().any(|f| f.is_empty()) {
            return Err(StorageError::EmptyKeyPattern);
        }
        let descriptor = IndexDescriptor::new(key_pattern);
        if self.indexes.iter().any(|i| i.descriptor().name == descriptor.name) {
            return Err(StorageError::IndexAlreadyExists(descriptor.name));
        }

        let mut index = Index::new(descriptor);
        for (record_id, doc) in self.iter() {
            index.insert(record_id, doc);
        }
        debug!(
            collection = %self.name,
            index = %index.descriptor().name,
            keys = index.len(),
            multikey = index.is_multikey(),
            "built index"
        );

        self.indexes.push(index);
        let last = self.indexes.len() - 1;
        Ok(self.indexes[last].descriptor())
    }

    /// Indexes in creation order.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.descriptor().name == name)
    }
}
