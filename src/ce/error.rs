//! Cardinality estimation failures.

use std::fmt;

use thiserror::Error;

/// Result type for estimation.
pub type CeResult<T> = Result<T, HistogramCeFailure>;

/// Why histogram estimation could not handle a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramCeFailureKind {
    /// No histogram exists for the field.
    MissingHistogram,
    /// The operand does not reduce to an exact scalar interval.
    InexactInterval,
    /// The interval falls outside the value domain of the buckets.
    UnestimableInterval,
}

impl fmt::Display for HistogramCeFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHistogram => write!(f, "no histogram available"),
            Self::InexactInterval => write!(f, "predicate cannot be converted to an exact interval"),
            Self::UnestimableInterval => write!(f, "interval is not estimable against the histogram"),
        }
    }
}

/// Histogram estimation failed for one field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("histogram CE failure on field '{field}': {kind}")]
pub struct HistogramCeFailure {
    pub field: String,
    pub kind: HistogramCeFailureKind,
}

impl HistogramCeFailure {
    pub fn new(field: impl Into<String>, kind: HistogramCeFailureKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}
