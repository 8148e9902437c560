//! Predicate evaluation against documents.
//!
//! Matching follows document-database rules: a field holding an array
//! matches when the array itself or any of its elements matches, a missing
//! field compares equal to null, and ordering comparisons only match
//! values of the operand's type bracket.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::{get_path, ComparisonOp, KeyValue, Predicate};

/// Check whether a document matches a predicate.
pub fn matches(predicate: &Predicate, doc: &Value) -> bool {
    match predicate {
        Predicate::Comparison { field, op, value } => {
            let operand = KeyValue::from_json(value);
            match op {
                ComparisonOp::Eq => field_equals(doc, field, &operand),
                ComparisonOp::Ne => !field_equals(doc, field, &operand),
                _ => candidates(doc, field)
                    .iter()
                    .any(|candidate| compare(candidate, *op, &operand)),
            }
        }
        Predicate::In { field, values, negated } => {
            let found = values
                .iter()
                .any(|v| field_equals(doc, field, &KeyValue::from_json(v)));
            found != *negated
        }
        Predicate::Exists { field, exists } => get_path(doc, field).is_some() == *exists,
        Predicate::And(children) => children.iter().all(|c| matches(c, doc)),
        Predicate::Or(children) => children.iter().any(|c| matches(c, doc)),
        Predicate::Not(inner) => !matches(inner, doc),
    }
}

/// Values a field comparison is tried against: the value itself, plus each
/// element when it is an array. A missing field stands for null.
fn candidates(doc: &Value, field: &str) -> Vec<KeyValue> {
    match get_path(doc, field) {
        None => vec![KeyValue::Null],
        Some(Value::Array(items)) => {
            let mut values: Vec<KeyValue> = items.iter().map(KeyValue::from_json).collect();
            values.push(KeyValue::from_json(&Value::Array(items.clone())));
            values
        }
        Some(value) => vec![KeyValue::from_json(value)],
    }
}

fn field_equals(doc: &Value, field: &str, operand: &KeyValue) -> bool {
    candidates(doc, field).iter().any(|candidate| candidate == operand)
}

fn compare(candidate: &KeyValue, op: ComparisonOp, operand: &KeyValue) -> bool {
    if candidate.bracket() != operand.bracket() {
        return false;
    }
    let ordering = candidate.cmp(operand);
    match op {
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Gte => ordering != Ordering::Less,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Lte => ordering != Ordering::Greater,
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Ne => ordering != Ordering::Equal,
    }
}
