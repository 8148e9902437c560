//! Ordered interval lists over `KeyValue`.
//!
//! Leaf predicates convert to interval lists. Index bounds are built from
//! them and the histogram estimator consumes them. An `IntervalList` is
//! always normalized: intervals are non-empty, sorted and disjoint.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::ast::{ComparisonOp, Predicate};
use super::value::KeyValue;

/// A single interval with per-endpoint inclusivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub start: KeyValue,
    pub start_inclusive: bool,
    pub end: KeyValue,
    pub end_inclusive: bool,
}

impl Interval {
    pub fn new(start: KeyValue, start_inclusive: bool, end: KeyValue, end_inclusive: bool) -> Self {
        Self {
            start,
            start_inclusive,
            end,
            end_inclusive,
        }
    }

    /// `[v, v]`.
    pub fn point(value: KeyValue) -> Self {
        Self::new(value.clone(), true, value, true)
    }

    /// `[MinKey, MaxKey]`.
    pub fn full() -> Self {
        Self::new(KeyValue::MinKey, true, KeyValue::MaxKey, true)
    }

    pub fn is_point(&self) -> bool {
        self.start_inclusive && self.end_inclusive && self.start == self.end
    }

    pub fn is_full(&self) -> bool {
        self.start == KeyValue::MinKey
            && self.end == KeyValue::MaxKey
            && self.start_inclusive
            && self.end_inclusive
    }

    pub fn is_empty(&self) -> bool {
        match self.start.cmp(&self.end) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.start_inclusive && self.end_inclusive),
            Ordering::Less => false,
        }
    }

    /// Check if a value lies inside the interval.
    pub fn contains(&self, value: &KeyValue) -> bool {
        let after_start = match value.cmp(&self.start) {
            Ordering::Greater => true,
            Ordering::Equal => self.start_inclusive,
            Ordering::Less => false,
        };
        let before_end = match value.cmp(&self.end) {
            Ordering::Less => true,
            Ordering::Equal => self.end_inclusive,
            Ordering::Greater => false,
        };
        after_start && before_end
    }

    /// Intersection of two intervals, `None` when disjoint.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let (start, start_inclusive) = match self.start.cmp(&other.start) {
            Ordering::Greater => (self.start.clone(), self.start_inclusive),
            Ordering::Less => (other.start.clone(), other.start_inclusive),
            Ordering::Equal => (self.start.clone(), self.start_inclusive && other.start_inclusive),
        };
        let (end, end_inclusive) = match self.end.cmp(&other.end) {
            Ordering::Less => (self.end.clone(), self.end_inclusive),
            Ordering::Greater => (other.end.clone(), other.end_inclusive),
            Ordering::Equal => (self.end.clone(), self.end_inclusive && other.end_inclusive),
        };
        let interval = Interval::new(start, start_inclusive, end, end_inclusive);
        if interval.is_empty() {
            None
        } else {
            Some(interval)
        }
    }

    fn start_order(&self, other: &Interval) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| other.start_inclusive.cmp(&self.start_inclusive))
    }

    /// Whether `next` (starting at or after self) overlaps or touches self.
    fn touches(&self, next: &Interval) -> bool {
        match next.start.cmp(&self.end) {
            Ordering::Less => true,
            Ordering::Equal => self.end_inclusive || next.start_inclusive,
            Ordering::Greater => false,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}, {}{}",
            if self.start_inclusive { "[" } else { "(" },
            self.start,
            self.end,
            if self.end_inclusive { "]" } else { ")" }
        )
    }
}

/// A normalized union of intervals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntervalList {
    intervals: Vec<Interval>,
}

impl IntervalList {
    /// Normalize arbitrary intervals into a sorted disjoint list.
    pub fn new(intervals: Vec<Interval>) -> Self {
        let mut intervals: Vec<Interval> = intervals.into_iter().filter(|i| !i.is_empty()).collect();
        intervals.sort_by(|a, b| a.start_order(b));

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if last.touches(&interval) => match interval.end.cmp(&last.end) {
                    Ordering::Greater => {
                        last.end = interval.end;
                        last.end_inclusive = interval.end_inclusive;
                    }
                    Ordering::Equal => last.end_inclusive |= interval.end_inclusive,
                    Ordering::Less => {}
                },
                _ => merged.push(interval),
            }
        }

        Self { intervals: merged }
    }

    pub fn full() -> Self {
        Self {
            intervals: vec![Interval::full()],
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(values: impl IntoIterator<Item = KeyValue>) -> Self {
        Self::new(values.into_iter().map(Interval::point).collect())
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.intervals.len() == 1 && self.intervals[0].is_full()
    }

    /// True when every interval is a single point (and there is at least one).
    pub fn is_all_points(&self) -> bool {
        !self.intervals.is_empty() && self.intervals.iter().all(Interval::is_point)
    }

    pub fn contains(&self, value: &KeyValue) -> bool {
        self.intervals.iter().any(|i| i.contains(value))
    }

    pub fn intersect(&self, other: &IntervalList) -> IntervalList {
        let mut out = Vec::new();
        for a in &self.intervals {
            for b in &other.intervals {
                if let Some(i) = a.intersect(b) {
                    out.push(i);
                }
            }
        }
        IntervalList::new(out)
    }

    pub fn union(&self, other: &IntervalList) -> IntervalList {
        let mut all = self.intervals.clone();
        all.extend(other.intervals.iter().cloned());
        IntervalList::new(all)
    }

    /// Complement relative to `[MinKey, MaxKey]`.
    pub fn complement(&self) -> IntervalList {
        let mut out = Vec::with_capacity(self.intervals.len() + 1);
        let mut cursor = KeyValue::MinKey;
        let mut cursor_inclusive = true;

        for interval in &self.intervals {
            out.push(Interval::new(
                cursor,
                cursor_inclusive,
                interval.start.clone(),
                !interval.start_inclusive,
            ));
            cursor = interval.end.clone();
            cursor_inclusive = !interval.end_inclusive;
        }
        out.push(Interval::new(cursor, cursor_inclusive, KeyValue::MaxKey, true));

        IntervalList::new(out)
    }

    /// Render as a list of interval strings, e.g. `["[1, 1]", "(10, inf.0]"]`.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.intervals
                .iter()
                .map(|i| Value::String(i.to_string()))
                .collect(),
        )
    }
}

impl fmt::Display for IntervalList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.intervals.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(" U "))
    }
}

/// Convert a leaf predicate into an exact interval list.
///
/// Returns `None` when the predicate cannot be expressed exactly as a range
/// over index keys: array operands (which also match elements), `$exists`
/// (null and missing share the null key) and non-leaf predicates.
pub fn leaf_intervals(predicate: &Predicate) -> Option<IntervalList> {
    match predicate {
        Predicate::Comparison { op, value, .. } => {
            let key = scalar_operand(value)?;
            Some(match op {
                ComparisonOp::Eq => IntervalList::points([key]),
                ComparisonOp::Ne => IntervalList::points([key]).complement(),
                ComparisonOp::Gt | ComparisonOp::Gte => {
                    let (_, max, max_inclusive) = KeyValue::bracket_range(key.bracket());
                    IntervalList::new(vec![Interval::new(
                        key,
                        *op == ComparisonOp::Gte,
                        max,
                        max_inclusive,
                    )])
                }
                ComparisonOp::Lt | ComparisonOp::Lte => {
                    let (min, _, _) = KeyValue::bracket_range(key.bracket());
                    IntervalList::new(vec![Interval::new(min, true, key, *op == ComparisonOp::Lte)])
                }
            })
        }
        Predicate::In { values, negated, .. } => {
            let keys = values.iter().map(scalar_operand).collect::<Option<Vec<_>>>()?;
            let list = IntervalList::points(keys);
            Some(if *negated { list.complement() } else { list })
        }
        _ => None,
    }
}

/// Whether a leaf can drive index bounds.
///
/// Negations are excluded: with array-valued fields a key outside the
/// excluded point does not prove the document matches.
pub fn is_sargable(predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Comparison { op, .. } if *op == ComparisonOp::Ne => false,
        Predicate::In { negated: true, .. } => false,
        _ => leaf_intervals(predicate).is_some(),
    }
}

fn scalar_operand(value: &Value) -> Option<KeyValue> {
    match value {
        Value::Array(_) => None,
        other => Some(KeyValue::from_json(other)),
    }
}
