//! Filter parsing errors.

use thiserror::Error;

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Filter parsing errors.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("filter must be a document, got: {0}")]
    NotADocument(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("invalid operand for {op}: {reason}")]
    InvalidOperand { op: String, reason: String },

    #[error("{0} requires a non-empty array of documents")]
    EmptyLogical(String),

    #[error("cannot mix operators and fields in expression for field '{0}'")]
    MixedOperators(String),

    #[error("empty field name")]
    EmptyFieldName,
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::Json(e.to_string())
    }
}
