//! Index bounds.
//!
//! Bounds hold one interval list per field of an index key pattern. A scan
//! walks the key ranges the bounds expand to: the leading fields that are
//! all points are expanded into every combination, the first field that
//! is not drives the range, and the fields after it are checked per key.

use std::fmt;
use std::iter;

use serde_json::{Map, Value};

use crate::query::{IntervalList, KeyValue};
use crate::storage::{IndexKey, KeyRange};

/// Per-field interval lists in key pattern order.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBounds {
    fields: Vec<(String, IntervalList)>,
}

impl IndexBounds {
    pub fn new(fields: Vec<(String, IntervalList)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, IntervalList)] {
        &self.fields
    }

    /// Number of leading fields made only of points.
    fn point_prefix_len(&self) -> usize {
        self.fields
            .iter()
            .take_while(|(_, list)| list.is_all_points())
            .count()
    }

    /// Fields that bound the key ranges: the point prefix plus the first
    /// range field.
    pub fn driving_fields(&self) -> &[(String, IntervalList)] {
        let len = (self.point_prefix_len() + 1).min(self.fields.len());
        &self.fields[..len]
    }

    /// Fields checked key by key rather than bounding the ranges.
    pub fn checked_fields(&self) -> &[(String, IntervalList)] {
        &self.fields[self.driving_fields().len()..]
    }

    /// True when no field is constrained.
    pub fn is_unbounded(&self) -> bool {
        self.fields.iter().all(|(_, list)| list.is_full())
    }

    /// Expand the bounds into ordered, disjoint key ranges.
    pub fn key_ranges(&self) -> Vec<KeyRange> {
        let prefix_len = self.point_prefix_len();

        let mut prefixes: Vec<IndexKey> = vec![Vec::with_capacity(self.fields.len())];
        for (_, list) in &self.fields[..prefix_len] {
            prefixes = prefixes
                .iter()
                .flat_map(|prefix| {
                    list.intervals().iter().map(move |point| {
                        let mut key = prefix.clone();
                        key.push(point.start.clone());
                        key
                    })
                })
                .collect();
        }

        let Some((_, list)) = self.fields.get(prefix_len) else {
            return prefixes.into_iter().map(KeyRange::point).collect();
        };

        let tail = self.fields.len() - prefix_len - 1;
        let mut ranges = Vec::with_capacity(prefixes.len() * list.len());
        for prefix in &prefixes {
            for interval in list.intervals() {
                let start_fill = if interval.start_inclusive { KeyValue::MinKey } else { KeyValue::MaxKey };
                let end_fill = if interval.end_inclusive { KeyValue::MaxKey } else { KeyValue::MinKey };

                let mut start = prefix.clone();
                start.push(interval.start.clone());
                start.extend(iter::repeat(start_fill).take(tail));

                let mut end = prefix.clone();
                end.push(interval.end.clone());
                end.extend(iter::repeat(end_fill).take(tail));

                ranges.push(KeyRange {
                    start,
                    start_inclusive: interval.start_inclusive,
                    end,
                    end_inclusive: interval.end_inclusive,
                });
            }
        }
        ranges
    }

    /// Check a key against every field's intervals.
    pub fn matches(&self, key: &[KeyValue]) -> bool {
        self.fields
            .iter()
            .zip(key)
            .all(|((_, list), component)| list.contains(component))
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (field, list) in &self.fields {
            map.insert(field.clone(), list.to_json());
        }
        Value::Object(map)
    }
}

impl fmt::Display for IndexBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, list)| format!("{}: {}", field, list))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
