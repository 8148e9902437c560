//! Filter document parser.
//!
//! Converts filter documents such as `{"a": {"$gt": 10}, "b": 99}` into the
//! internal `Predicate` tree.

use serde_json::{Map, Value};

use super::ast::{ComparisonOp, Predicate};
use super::error::{ParseError, ParseResult};

/// Filter parser.
pub struct Parser;

impl Parser {
    /// Parse a filter from its JSON text.
    pub fn parse_str(filter: &str) -> ParseResult<Predicate> {
        let value: Value = serde_json::from_str(filter)?;
        Self::parse(&value)
    }

    /// Parse a filter document.
    pub fn parse(filter: &Value) -> ParseResult<Predicate> {
        let doc = filter
            .as_object()
            .ok_or_else(|| ParseError::NotADocument(filter.to_string()))?;
        Self::parse_document(doc)
    }

    fn parse_document(doc: &Map<String, Value>) -> ParseResult<Predicate> {
        let mut parts = Vec::with_capacity(doc.len());

        for (key, value) in doc {
            if let Some(op) = key.strip_prefix('$') {
                parts.push(Self::parse_logical(op, value)?);
            } else {
                parts.push(Self::parse_field(key, value)?);
            }
        }

        Ok(Predicate::and(parts))
    }

    fn parse_logical(op: &str, value: &Value) -> ParseResult<Predicate> {
        let name = format!("${}", op);
        let items = match value.as_array() {
            Some(items) if !items.is_empty() => items,
            _ => return Err(ParseError::EmptyLogical(name)),
        };

        let children = items
            .iter()
            .map(|item| match item.as_object() {
                Some(doc) => Self::parse_document(doc),
                None => Err(ParseError::EmptyLogical(name.clone())),
            })
            .collect::<ParseResult<Vec<_>>>()?;

        match op {
            "and" => Ok(Predicate::and(children)),
            "or" => Ok(Predicate::or(children)),
            "nor" => Ok(Predicate::Not(Box::new(Predicate::or(children)))),
            _ => Err(ParseError::UnknownOperator(name)),
        }
    }

    fn parse_field(field: &str, value: &Value) -> ParseResult<Predicate> {
        if field.is_empty() {
            return Err(ParseError::EmptyFieldName);
        }

        match value.as_object() {
            Some(ops) if Self::is_operator_document(field, ops)? => {
                Self::parse_operators(field, ops)
            }
            // Literal documents, arrays and scalars are implicit equality.
            _ => Ok(Predicate::Comparison {
                field: field.to_string(),
                op: ComparisonOp::Eq,
                value: value.clone(),
            }),
        }
    }

    fn is_operator_document(field: &str, doc: &Map<String, Value>) -> ParseResult<bool> {
        let operators = doc.keys().filter(|k| k.starts_with('$')).count();
        if operators == 0 {
            return Ok(false);
        }
        if operators != doc.len() {
            return Err(ParseError::MixedOperators(field.to_string()));
        }
        Ok(true)
    }

    fn parse_operators(field: &str, ops: &Map<String, Value>) -> ParseResult<Predicate> {
        let mut parts = Vec::with_capacity(ops.len());

        for (name, operand) in ops {
            let part = if let Some(op) = ComparisonOp::from_name(name) {
                Predicate::Comparison {
                    field: field.to_string(),
                    op,
                    value: operand.clone(),
                }
            } else {
                match name.as_str() {
                    "$in" | "$nin" => {
                        let values = operand.as_array().ok_or_else(|| ParseError::InvalidOperand {
                            op: name.clone(),
                            reason: "expected an array".into(),
                        })?;
                        Predicate::In {
                            field: field.to_string(),
                            values: values.clone(),
                            negated: name == "$nin",
                        }
                    }
                    "$exists" => Predicate::Exists {
                        field: field.to_string(),
                        exists: is_truthy(operand),
                    },
                    "$not" => {
                        let inner = operand.as_object().ok_or_else(|| ParseError::InvalidOperand {
                            op: name.clone(),
                            reason: "expected an operator document".into(),
                        })?;
                        if !Self::is_operator_document(field, inner)? {
                            return Err(ParseError::InvalidOperand {
                                op: name.clone(),
                                reason: "expected an operator document".into(),
                            });
                        }
                        Predicate::Not(Box::new(Self::parse_operators(field, inner)?))
                    }
                    _ => return Err(ParseError::UnknownOperator(name.clone())),
                }
            };
            parts.push(part);
        }

        Ok(Predicate::and(parts))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_implicit_equality() {
        let p = Parser::parse(&json!({"a": 1})).unwrap();
        assert_eq!(
            p,
            Predicate::Comparison { field: "a".into(), op: ComparisonOp::Eq, value: json!(1) }
        );
    }

    #[test]
    fn test_operator_document() {
        let p = Parser::parse(&json!({"a": {"$gt": 10}, "b": {"$eq": 99}})).unwrap();
        assert_eq!(p.conjuncts().len(), 2);
        assert!(matches!(p.conjuncts()[0], Predicate::Comparison { op: ComparisonOp::Gt, .. }));
    }

    #[test]
    fn test_range_on_one_field_is_conjunction() {
        let p = Parser::parse(&json!({"a": {"$gt": 1, "$lt": 5}})).unwrap();
        assert_eq!(p.conjuncts().len(), 2);
    }

    #[test]
    fn test_rooted_or() {
        let p = Parser::parse(&json!({"$or": [{"a": 1}, {"b": {"$in": [1, 2]}}]})).unwrap();
        assert!(p.is_rooted_or());
    }

    #[test]
    fn test_conjunction_of_disjunctions() {
        let p = Parser::parse(&json!({"$and": [
            {"$or": [{"a": 10}, {"b": {"$gt": 99}}]},
            {"$or": [{"a": {"$in": [5, 1]}}, {"b": {"$in": [7, 99]}}]},
        ]}))
        .unwrap();
        let conjuncts = p.conjuncts();
        assert_eq!(conjuncts.len(), 2);
        assert!(conjuncts.iter().all(|c| matches!(c, Predicate::Or(_))));
    }

    #[test]
    fn test_literal_document_is_equality() {
        let p = Parser::parse(&json!({"a": {"foo": 1}})).unwrap();
        assert!(matches!(p, Predicate::Comparison { op: ComparisonOp::Eq, .. }));
    }

    #[test]
    fn test_empty_filter() {
        assert!(Parser::parse(&json!({})).unwrap().is_trivially_true());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(Parser::parse(&json!([1])), Err(ParseError::NotADocument(_))));
        assert!(matches!(
            Parser::parse(&json!({"a": {"$regex": "x"}})),
            Err(ParseError::UnknownOperator(_))
        ));
        assert!(matches!(
            Parser::parse(&json!({"a": {"$gt": 1, "b": 2}})),
            Err(ParseError::MixedOperators(_))
        ));
        assert!(matches!(Parser::parse(&json!({"$or": []})), Err(ParseError::EmptyLogical(_))));
        assert!(matches!(
            Parser::parse(&json!({"a": {"$in": 5}})),
            Err(ParseError::InvalidOperand { .. })
        ));
        assert!(Parser::parse_str("{not json").is_err());
    }

    #[test]
    fn test_nor_and_not() {
        let p = Parser::parse(&json!({"$nor": [{"a": 1}]})).unwrap();
        assert!(matches!(p, Predicate::Not(_)));
        let p = Parser::parse(&json!({"a": {"$not": {"$gt": 5}}})).unwrap();
        assert!(matches!(p, Predicate::Not(_)));
    }
}
