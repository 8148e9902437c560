//! Equi-depth histograms over a single field.
//!
//! Each bucket describes the values in `[lower_bound, upper_bound]`:
//! `equal_count` documents hold exactly `upper_bound`, and `range_count`
//! documents spread over `range_distinct` distinct values below it.
//! Buckets never straddle a type bracket, so interpolation inside a bucket
//! always compares values of one type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{StatsError, StatsResult};
use crate::query::{Interval, IntervalList, KeyValue};

/// One histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Smallest value of the range part, or the upper bound when empty.
    pub lower_bound: KeyValue,
    pub upper_bound: KeyValue,
    pub equal_count: f64,
    pub range_count: f64,
    pub range_distinct: f64,
}

impl Bucket {
    fn total(&self) -> f64 {
        self.equal_count + self.range_count
    }

    /// Fraction of the range part strictly below `value`, for a value not
    /// above the upper bound.
    fn range_fraction_below(&self, value: &KeyValue) -> f64 {
        if self.range_count == 0.0 || *value <= self.lower_bound {
            return 0.0;
        }
        if *value == self.upper_bound {
            return 1.0;
        }
        match (self.lower_bound.to_f64(), self.upper_bound.to_f64(), value.to_f64()) {
            (Some(lo), Some(hi), Some(v)) if hi > lo => ((v - lo) / (hi - lo)).clamp(0.0, 1.0),
            _ => 0.5,
        }
    }
}

/// Statistics for one `(collection, field)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    pub collection: String,
    pub field: String,
    pub buckets: Vec<Bucket>,
    /// Documents scanned when the histogram was built.
    pub document_count: f64,
    /// Documents whose value was an object or a non-empty array.
    pub non_scalar_count: f64,
    pub built_at: DateTime<Utc>,
}

impl Histogram {
    /// Build a histogram from the field value of every document, `None`
    /// standing for a missing field.
    pub fn build<'a, I>(
        collection: &str,
        field: &str,
        values: I,
        num_buckets: usize,
    ) -> StatsResult<Self>
    where
        I: IntoIterator<Item = Option<&'a Value>>,
    {
        if num_buckets == 0 {
            return Err(StatsError::InvalidBucketCount(num_buckets));
        }
        if field.is_empty() {
            return Err(StatsError::EmptyField);
        }

        let mut document_count = 0.0;
        let mut non_scalar_count = 0.0;
        let mut scalars = Vec::new();
        for value in values {
            document_count += 1.0;
            let key = value.map(KeyValue::from_json).unwrap_or(KeyValue::Null);
            if key.is_scalar() {
                scalars.push(key);
            } else {
                non_scalar_count += 1.0;
            }
        }
        scalars.sort();

        let mut distinct: Vec<(KeyValue, f64)> = Vec::new();
        for key in scalars {
            match distinct.last_mut() {
                Some((last, count)) if *last == key => *count += 1.0,
                _ => distinct.push((key, 1.0)),
            }
        }

        let scalar_count = document_count - non_scalar_count;
        let depth = (scalar_count / num_buckets as f64).max(1.0);
        let mut buckets = Vec::with_capacity(num_buckets.min(distinct.len()));
        let mut lower: Option<KeyValue> = None;
        let mut range_count = 0.0;
        let mut range_distinct = 0.0;

        for (i, (value, count)) in distinct.iter().enumerate() {
            let bracket_ends = distinct
                .get(i + 1)
                .map_or(true, |(next, _)| next.bracket() != value.bracket());

            if range_count + count >= depth || bracket_ends {
                buckets.push(Bucket {
                    lower_bound: lower.take().unwrap_or_else(|| value.clone()),
                    upper_bound: value.clone(),
                    equal_count: *count,
                    range_count,
                    range_distinct,
                });
                range_count = 0.0;
                range_distinct = 0.0;
            } else {
                if lower.is_none() {
                    lower = Some(value.clone());
                }
                range_count += count;
                range_distinct += 1.0;
            }
        }

        Ok(Self {
            collection: collection.to_string(),
            field: field.to_string(),
            buckets,
            document_count,
            non_scalar_count,
            built_at: Utc::now(),
        })
    }

    /// Estimated number of documents equal to `value`.
    pub fn count_eq(&self, value: &KeyValue) -> f64 {
        let idx = self.buckets.partition_point(|b| b.upper_bound < *value);
        let Some(bucket) = self.buckets.get(idx) else {
            return 0.0;
        };
        if bucket.upper_bound == *value {
            bucket.equal_count
        } else if bucket.range_distinct > 0.0 && bucket.lower_bound <= *value {
            bucket.range_count / bucket.range_distinct
        } else {
            0.0
        }
    }

    /// Estimated number of documents strictly below `value`.
    pub fn count_lt(&self, value: &KeyValue) -> f64 {
        let idx = self.buckets.partition_point(|b| b.upper_bound < *value);
        let below: f64 = self.buckets[..idx].iter().map(Bucket::total).sum();
        match self.buckets.get(idx) {
            Some(bucket) => below + bucket.range_fraction_below(value) * bucket.range_count,
            None => below,
        }
    }

    pub fn count_le(&self, value: &KeyValue) -> f64 {
        self.count_lt(value) + self.count_eq(value)
    }

    /// Estimated number of documents inside one interval.
    pub fn count_interval(&self, interval: &Interval) -> f64 {
        let through_end = if interval.end_inclusive {
            self.count_le(&interval.end)
        } else {
            self.count_lt(&interval.end)
        };
        let before_start = if interval.start_inclusive {
            self.count_lt(&interval.start)
        } else {
            self.count_le(&interval.start)
        };
        (through_end - before_start).max(0.0)
    }

    /// Estimated number of documents inside an interval list.
    pub fn count_intervals(&self, intervals: &IntervalList) -> f64 {
        intervals
            .intervals()
            .iter()
            .map(|i| self.count_interval(i))
            .sum::<f64>()
            .min(self.document_count)
    }

    /// Fraction of the documents seen at build time that fall inside the
    /// intervals.
    pub fn selectivity(&self, intervals: &IntervalList) -> f64 {
        if self.document_count == 0.0 {
            return 0.0;
        }
        (self.count_intervals(intervals) / self.document_count).clamp(0.0, 1.0)
    }

    /// Whether the interval stays within the value domain the buckets
    /// describe. Intervals reaching into the object or array brackets are
    /// not.
    pub fn is_estimable(interval: &Interval) -> bool {
        let end_ok = interval.end.is_scalar() || {
            let (bracket_min, _, _) = KeyValue::bracket_range(interval.end.bracket());
            !interval.end_inclusive && interval.end == bracket_min
        };
        interval.start.is_scalar() && end_ok
    }
}
