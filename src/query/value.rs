//! Canonical ordering of document values.
//!
//! Index keys, interval endpoints and histogram boundaries all live in the
//! `KeyValue` domain. Values of different types never compare by content;
//! they are ordered by their type bracket first:
//!
//! ```text
//! MinKey < Null < Number < String < Object < Array < Bool < MaxKey
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type brackets in canonical sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeBracket {
    MinKey,
    Null,
    Number,
    String,
    Object,
    Array,
    Bool,
    MaxKey,
}

impl TypeBracket {
    /// Brackets whose values can be placed in a histogram bucket.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, TypeBracket::Object | TypeBracket::Array)
    }
}

/// A value in index-key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeyValue {
    MinKey,
    Null,
    Number(f64),
    String(String),
    Object(Vec<(String, KeyValue)>),
    Array(Vec<KeyValue>),
    Bool(bool),
    MaxKey,
}

impl KeyValue {
    /// Convert a JSON value into key order representation.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => KeyValue::Null,
            Value::Bool(b) => KeyValue::Bool(*b),
            Value::Number(n) => KeyValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => KeyValue::String(s.clone()),
            Value::Array(items) => KeyValue::Array(items.iter().map(KeyValue::from_json).collect()),
            Value::Object(map) => KeyValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), KeyValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// The type bracket this value sorts in.
    pub fn bracket(&self) -> TypeBracket {
        match self {
            KeyValue::MinKey => TypeBracket::MinKey,
            KeyValue::Null => TypeBracket::Null,
            KeyValue::Number(_) => TypeBracket::Number,
            KeyValue::String(_) => TypeBracket::String,
            KeyValue::Object(_) => TypeBracket::Object,
            KeyValue::Array(_) => TypeBracket::Array,
            KeyValue::Bool(_) => TypeBracket::Bool,
            KeyValue::MaxKey => TypeBracket::MaxKey,
        }
    }

    /// Smallest and largest values of a bracket.
    ///
    /// The flag says whether the upper value itself belongs to the bracket.
    /// Brackets without a natural maximum end at the first value of the next
    /// bracket, exclusive.
    pub fn bracket_range(bracket: TypeBracket) -> (KeyValue, KeyValue, bool) {
        match bracket {
            TypeBracket::MinKey => (KeyValue::MinKey, KeyValue::MinKey, true),
            TypeBracket::Null => (KeyValue::Null, KeyValue::Null, true),
            TypeBracket::Number => (
                KeyValue::Number(f64::NEG_INFINITY),
                KeyValue::Number(f64::INFINITY),
                true,
            ),
            TypeBracket::String => (KeyValue::String(String::new()), KeyValue::Object(Vec::new()), false),
            TypeBracket::Object => (KeyValue::Object(Vec::new()), KeyValue::Array(Vec::new()), false),
            TypeBracket::Array => (KeyValue::Array(Vec::new()), KeyValue::Bool(false), false),
            TypeBracket::Bool => (KeyValue::Bool(false), KeyValue::Bool(true), true),
            TypeBracket::MaxKey => (KeyValue::MaxKey, KeyValue::MaxKey, true),
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.bracket().is_scalar()
    }

    /// Numeric projection used for interpolation inside a bracket.
    ///
    /// Strings project their first eight bytes as a big-endian integer.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            KeyValue::Number(n) => Some(*n),
            KeyValue::String(s) => {
                let mut prefix = [0u8; 8];
                for (slot, byte) in prefix.iter_mut().zip(s.as_bytes()) {
                    *slot = *byte;
                }
                Some(u64::from_be_bytes(prefix) as f64)
            }
            KeyValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            KeyValue::Null => Some(0.0),
            _ => None,
        }
    }

    /// Convert back to JSON. Infinite numbers and MinKey/MaxKey use
    /// extended-JSON style markers.
    pub fn to_json(&self) -> Value {
        match self {
            KeyValue::MinKey => serde_json::json!({ "$minKey": 1 }),
            KeyValue::MaxKey => serde_json::json!({ "$maxKey": 1 }),
            KeyValue::Null => Value::Null,
            KeyValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(format_number(*n))),
            KeyValue::String(s) => Value::String(s.clone()),
            KeyValue::Bool(b) => Value::Bool(*b),
            KeyValue::Array(items) => Value::Array(items.iter().map(KeyValue::to_json).collect()),
            KeyValue::Object(fields) => Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_bracket = self.bracket().cmp(&other.bracket());
        if by_bracket != Ordering::Equal {
            return by_bracket;
        }
        match (self, other) {
            (KeyValue::Number(a), KeyValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b))
            }
            (KeyValue::String(a), KeyValue::String(b)) => a.cmp(b),
            (KeyValue::Bool(a), KeyValue::Bool(b)) => a.cmp(b),
            (KeyValue::Array(a), KeyValue::Array(b)) => a.cmp(b),
            (KeyValue::Object(a), KeyValue::Object(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::MinKey => write!(f, "MinKey"),
            KeyValue::MaxKey => write!(f, "MaxKey"),
            KeyValue::Null => write!(f, "null"),
            KeyValue::Number(n) => write!(f, "{}", format_number(*n)),
            KeyValue::String(s) => write!(f, "\"{}\"", s),
            KeyValue::Bool(b) => write!(f, "{}", b),
            KeyValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            KeyValue::Object(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n == f64::INFINITY {
        "inf.0".to_string()
    } else if n == f64::NEG_INFINITY {
        "-inf.0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Resolve a dotted field path inside a document.
///
/// Only objects are traversed; a path through an array yields `None`.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}
