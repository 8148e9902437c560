//! Secondary indexes.
//!
//! An index keeps one entry per generated key, ordered by
//! `(key, record id)`. Documents with an array on an indexed field produce
//! one key per element, which flips the index to multikey.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;

use serde_json::Value;

use super::types::RecordId;
use crate::query::{get_path, KeyValue};

/// A compound index key.
pub type IndexKey = Vec<KeyValue>;

/// An index entry: the key and the record it points to.
pub type IndexEntry = (IndexKey, RecordId);

/// A contiguous range of index keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: IndexKey,
    pub start_inclusive: bool,
    pub end: IndexKey,
    pub end_inclusive: bool,
}

impl KeyRange {
    /// The range holding exactly one key.
    pub fn point(key: IndexKey) -> Self {
        Self {
            start: key.clone(),
            start_inclusive: true,
            end: key,
            end_inclusive: true,
        }
    }
}

/// Static description of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub key_pattern: Vec<String>,
}

impl IndexDescriptor {
    /// Create a descriptor named after its key pattern (`a_1_b_1`).
    pub fn new(key_pattern: Vec<String>) -> Self {
        let name = key_pattern
            .iter()
            .map(|f| format!("{}_1", f))
            .collect::<Vec<_>>()
            .join("_");
        Self { name, key_pattern }
    }

    /// Position of a field in the key pattern.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.key_pattern.iter().position(|f| f == field)
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.key_pattern.iter().map(|k| format!("{}: 1", k)).collect();
        write!(f, "{{ {} }}", fields.join(", "))
    }
}

/// An in-memory ordered index.
#[derive(Debug, Clone)]
pub struct Index {
    descriptor: IndexDescriptor,
    entries: BTreeSet<IndexEntry>,
    multikey: bool,
}

impl Index {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self {
            descriptor,
            entries: BTreeSet::new(),
            multikey: false,
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn is_multikey(&self) -> bool {
        self.multikey
    }

    /// Number of keys in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index a document.
    pub fn insert(&mut self, record_id: RecordId, doc: &Value) {
        let (keys, multikey) = self.generate_keys(doc);
        self.multikey |= multikey;
        for key in keys {
            self.entries.insert((key, record_id));
        }
    }

    /// Generate the keys of a document. Missing fields index as null.
    fn generate_keys(&self, doc: &Value) -> (Vec<IndexKey>, bool) {
        let mut keys: Vec<IndexKey> = vec![Vec::with_capacity(self.descriptor.key_pattern.len())];
        let mut multikey = false;

        for field in &self.descriptor.key_pattern {
            let components: Vec<KeyValue> = match get_path(doc, field) {
                None => vec![KeyValue::Null],
                Some(Value::Array(items)) if !items.is_empty() => {
                    multikey = true;
                    let mut elems: Vec<KeyValue> = items.iter().map(KeyValue::from_json).collect();
                    elems.sort();
                    elems.dedup();
                    elems
                }
                Some(value) => vec![KeyValue::from_json(value)],
            };

            keys = keys
                .into_iter()
                .flat_map(|prefix| {
                    components.iter().map(move |c| {
                        let mut key = prefix.clone();
                        key.push(c.clone());
                        key
                    })
                })
                .collect();
        }

        (keys, multikey)
    }

    /// The next entry inside `range`: the first one when `after` is `None`,
    /// otherwise the first one strictly after `after`.
    pub fn next_entry(&self, after: Option<&IndexEntry>, range: &KeyRange) -> Option<&IndexEntry> {
        let lower = match after {
            Some(entry) => Bound::Excluded(entry.clone()),
            None if range.start_inclusive => Bound::Included((range.start.clone(), RecordId::MIN)),
            None => Bound::Excluded((range.start.clone(), RecordId::MAX)),
        };
        let upper = if range.end_inclusive {
            Bound::Included((range.end.clone(), RecordId::MAX))
        } else {
            Bound::Excluded((range.end.clone(), RecordId::MIN))
        };
        if !is_nonempty(&lower, &upper) {
            return None;
        }
        self.entries.range((lower, upper)).next()
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }
}

fn is_nonempty(lower: &Bound<IndexEntry>, upper: &Bound<IndexEntry>) -> bool {
    let (lo, lo_inclusive) = match lower {
        Bound::Included(e) => (e, true),
        Bound::Excluded(e) => (e, false),
        Bound::Unbounded => return true,
    };
    let (hi, hi_inclusive) = match upper {
        Bound::Included(e) => (e, true),
        Bound::Excluded(e) => (e, false),
        Bound::Unbounded => return true,
    };
    match lo.cmp(hi) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Equal => lo_inclusive && hi_inclusive,
        std::cmp::Ordering::Greater => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn n(v: f64) -> KeyValue {
        KeyValue::Number(v)
    }

    #[test]
    fn test_descriptor_name() {
        let d = IndexDescriptor::new(vec!["c".into(), "b".into(), "a".into()]);
        assert_eq!(d.name, "c_1_b_1_a_1");
        assert_eq!(d.to_string(), "{ c: 1, b: 1, a: 1 }");
        assert_eq!(d.position("a"), Some(2));
    }

    #[test]
    fn test_missing_field_indexes_as_null() {
        let mut index = Index::new(IndexDescriptor::new(vec!["a".into()]));
        index.insert(RecordId(0), &json!({"b": 1}));
        let (key, _) = index.iter().next().unwrap();
        assert_eq!(key, &vec![KeyValue::Null]);
    }

    #[test]
    fn test_multikey() {
        let mut index = Index::new(IndexDescriptor::new(vec!["a".into(), "b".into()]));
        index.insert(RecordId(0), &json!({"a": [1, 2, 2], "b": 5}));
        assert!(index.is_multikey());
        assert_eq!(index.len(), 2);
    }

    fn scan(index: &Index, range: &KeyRange) -> Vec<RecordId> {
        let mut seen = Vec::new();
        let mut cursor = index.next_entry(None, range);
        while let Some(entry) = cursor {
            seen.push(entry.1);
            cursor = index.next_entry(Some(entry), range);
        }
        seen
    }

    #[test]
    fn test_next_entry_walks_range() {
        let mut index = Index::new(IndexDescriptor::new(vec!["a".into()]));
        for i in 0..10 {
            index.insert(RecordId(i), &json!({"a": i}));
        }
        let closed = KeyRange {
            start: vec![n(3.0)],
            start_inclusive: true,
            end: vec![n(5.0)],
            end_inclusive: true,
        };
        assert_eq!(scan(&index, &closed), vec![RecordId(3), RecordId(4), RecordId(5)]);

        let open = KeyRange { start_inclusive: false, end_inclusive: false, ..closed };
        assert_eq!(scan(&index, &open), vec![RecordId(4)]);
        assert_eq!(scan(&index, &KeyRange::point(vec![n(7.0)])), vec![RecordId(7)]);
    }

    #[test]
    fn test_inverted_or_empty_range() {
        let mut index = Index::new(IndexDescriptor::new(vec!["a".into()]));
        index.insert(RecordId(0), &json!({"a": 1}));
        let inverted = KeyRange {
            start: vec![n(5.0)],
            start_inclusive: true,
            end: vec![n(1.0)],
            end_inclusive: true,
        };
        assert!(index.next_entry(None, &inverted).is_none());
        let empty = KeyRange {
            start: vec![n(1.0)],
            start_inclusive: false,
            end: vec![n(1.0)],
            end_inclusive: true,
        };
        assert!(index.next_entry(None, &empty).is_none());
    }
}
