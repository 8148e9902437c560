//! core identifier types for the storage layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a document inside its collection.
///
/// Record ids are assigned in insertion order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub(crate) u64);

impl RecordId {
    pub const MIN: RecordId = RecordId(0);
    pub const MAX: RecordId = RecordId(u64::MAX);

    /// the raw position
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated collection name.
///
/// Valid names:
/// - 1-64 characters
/// - Alphanumeric, underscores, hyphens only
/// - Must start with a letter or underscore
/// - Cannot be reserved names (system, _stats)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionName(String);

impl CollectionName {
    /// reserved collection names that can't be used
    const RESERVED: &'static [&'static str] = &["system", "_stats"];

    /// create a new CollectionName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        let first_char = name.chars().next().ok_or(InvalidNameError::Empty)?;

        if name.len() > 64 {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        if !(first_char.is_ascii_alphabetic() || first_char == '_') {
            return Err(InvalidNameError::InvalidStart(first_char));
        }

        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        if Self::RESERVED.contains(&name.to_lowercase().as_str()) {
            return Err(InvalidNameError::Reserved(name.to_string()));
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// error type for invalid collection names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNameError {
    #[error("name cannot be empty")]
    Empty,
    #[error("name too long: {0} characters")]
    TooLong(usize),
    #[error("name cannot start with '{0}'")]
    InvalidStart(char),
    #[error("invalid character '{char}' at position {position}")]
    InvalidCharacter { char: char, position: usize },
    #[error("'{0}' is a reserved name")]
    Reserved(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_collection_name_valid() {
        assert!(CollectionName::new("users").is_ok());
        assert!(CollectionName::new("cbr_infrastructure").is_ok());
        assert!(CollectionName::new("Coll123").is_ok());
        assert!(CollectionName::new("_private").is_ok());
        assert!(CollectionName::new("my-coll").is_ok());
    }

    #[test]
    fn test_collection_name_invalid() {
        assert_eq!(CollectionName::new(""), Err(InvalidNameError::Empty));
        assert!(CollectionName::new("123users").is_err()); // starts with number
        assert!(CollectionName::new("users/admin").is_err()); // contains slash
        assert!(CollectionName::new("system").is_err()); // reserved
        assert!(CollectionName::new("a".repeat(65)).is_err()); // too long
    }

    #[test]
    fn test_invalid_name_messages() {
        let err = CollectionName::new("users/admin").unwrap_err();
        assert_eq!(err.to_string(), "invalid character '/' at position 5");
        let err = StorageError::from(InvalidNameError::Empty);
        assert_eq!(err.to_string(), "invalid collection name: name cannot be empty");
    }

    #[test]
    fn test_record_id_order() {
        assert!(RecordId(3) < RecordId(10));
        assert!(RecordId::MIN <= RecordId(0));
        assert_eq!(RecordId(7).to_string(), "7");
    }
}
