//! Logical predicate tree.
//!
//! A `Predicate` is built once from the filter document of a query and is
//! never mutated afterwards. Plans and estimators borrow it.

use std::fmt;

use serde_json::{json, Map, Value};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    /// Operator name as written in a filter document.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "$eq",
            ComparisonOp::Ne => "$ne",
            ComparisonOp::Gt => "$gt",
            ComparisonOp::Gte => "$gte",
            ComparisonOp::Lt => "$lt",
            ComparisonOp::Lte => "$lte",
        }
    }

    /// Parse an operator name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "$eq" => Some(ComparisonOp::Eq),
            "$ne" => Some(ComparisonOp::Ne),
            "$gt" => Some(ComparisonOp::Gt),
            "$gte" => Some(ComparisonOp::Gte),
            "$lt" => Some(ComparisonOp::Lt),
            "$lte" => Some(ComparisonOp::Lte),
            _ => None,
        }
    }

    /// Check if this is an ordering comparison.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            ComparisonOp::Gt | ComparisonOp::Gte | ComparisonOp::Lt | ComparisonOp::Lte
        )
    }
}

/// A node of the logical query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field <op> value`.
    Comparison {
        field: String,
        op: ComparisonOp,
        value: Value,
    },
    /// `field $in [..]` or `field $nin [..]`.
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// `field $exists bool`.
    Exists { field: String, exists: bool },
    /// Conjunction. An empty conjunction matches everything.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

impl Predicate {
    /// The predicate of an empty filter.
    pub fn always_true() -> Self {
        Predicate::And(Vec::new())
    }

    /// Build a conjunction, flattening nested conjunctions.
    pub fn and(children: Vec<Predicate>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Predicate::And(flat)
        }
    }

    /// Build a disjunction, flattening nested disjunctions.
    pub fn or(children: Vec<Predicate>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Predicate::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Predicate::Or(flat)
        }
    }

    /// True for the empty filter.
    pub fn is_trivially_true(&self) -> bool {
        matches!(self, Predicate::And(children) if children.is_empty())
    }

    /// True when the whole predicate is a single top-level disjunction.
    pub fn is_rooted_or(&self) -> bool {
        matches!(self, Predicate::Or(_))
    }

    /// The top-level conjuncts of this predicate.
    pub fn conjuncts(&self) -> Vec<&Predicate> {
        match self {
            Predicate::And(children) => children.iter().collect(),
            other => vec![other],
        }
    }

    /// The field a leaf predicate constrains.
    pub fn field(&self) -> Option<&str> {
        match self {
            Predicate::Comparison { field, .. }
            | Predicate::In { field, .. }
            | Predicate::Exists { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Check if this is a leaf (single-field) predicate.
    pub fn is_leaf(&self) -> bool {
        self.field().is_some()
    }

    /// Render the predicate as a filter document.
    pub fn to_json(&self) -> Value {
        match self {
            Predicate::Comparison { field, op, value } => {
                json!({ field.clone(): { op.as_str(): value } })
            }
            Predicate::In { field, values, negated } => {
                let op = if *negated { "$nin" } else { "$in" };
                json!({ field.clone(): { op: values } })
            }
            Predicate::Exists { field, exists } => json!({ field.clone(): { "$exists": exists } }),
            Predicate::And(children) if children.is_empty() => Value::Object(Map::new()),
            Predicate::And(children) => {
                json!({ "$and": children.iter().map(Predicate::to_json).collect::<Vec<_>>() })
            }
            Predicate::Or(children) => {
                json!({ "$or": children.iter().map(Predicate::to_json).collect::<Vec<_>>() })
            }
            Predicate::Not(inner) => json!({ "$nor": [inner.to_json()] }),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(field: &str, v: i64) -> Predicate {
        Predicate::Comparison {
            field: field.into(),
            op: ComparisonOp::Eq,
            value: json!(v),
        }
    }

    #[test]
    fn test_and_flattens() {
        let p = Predicate::and(vec![eq("a", 1), Predicate::and(vec![eq("b", 2), eq("c", 3)])]);
        assert_eq!(p.conjuncts().len(), 3);
    }

    #[test]
    fn test_single_child_unwraps() {
        assert_eq!(Predicate::or(vec![eq("a", 1)]), eq("a", 1));
        assert_eq!(Predicate::and(vec![eq("a", 1)]), eq("a", 1));
    }

    #[test]
    fn test_rooted_or() {
        let p = Predicate::or(vec![eq("a", 1), eq("b", 2)]);
        assert!(p.is_rooted_or());
        assert!(!Predicate::and(vec![p, eq("c", 1)]).is_rooted_or());
    }

    #[test]
    fn test_to_json() {
        let p = Predicate::and(vec![
            eq("a", 1),
            Predicate::In { field: "b".into(), values: vec![json!(7), json!(99)], negated: false },
        ]);
        assert_eq!(p.to_json(), json!({"$and": [{"a": {"$eq": 1}}, {"b": {"$in": [7, 99]}}]}));
        assert_eq!(Predicate::always_true().to_json(), json!({}));
    }
}
