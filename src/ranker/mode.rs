//! Plan ranker mode selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ce::{AutomaticEstimator, CardinalityEstimator, HeuristicEstimator, HistogramEstimator};

/// How candidate plans are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RankerMode {
    /// Run the candidates for a trial period and keep the most productive.
    #[default]
    #[serde(rename = "multiPlanning")]
    MultiPlanning,
    #[serde(rename = "heuristicCE")]
    HeuristicCe,
    /// Histogram estimates only; estimation failures are errors.
    #[serde(rename = "histogramCE")]
    HistogramCe,
    /// Histogram estimates with heuristic fallback.
    #[serde(rename = "automaticCE")]
    AutomaticCe,
}

impl RankerMode {
    pub const ALL: [RankerMode; 4] = [
        RankerMode::MultiPlanning,
        RankerMode::HeuristicCe,
        RankerMode::HistogramCe,
        RankerMode::AutomaticCe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankerMode::MultiPlanning => "multiPlanning",
            RankerMode::HeuristicCe => "heuristicCE",
            RankerMode::HistogramCe => "histogramCE",
            RankerMode::AutomaticCe => "automaticCE",
        }
    }

    /// Whether this mode ranks by estimated cost.
    pub fn is_cost_based(&self) -> bool {
        !matches!(self, RankerMode::MultiPlanning)
    }

    /// The estimator a cost-based mode uses.
    pub fn estimator(&self) -> Option<Box<dyn CardinalityEstimator>> {
        match self {
            RankerMode::MultiPlanning => None,
            RankerMode::HeuristicCe => Some(Box::new(HeuristicEstimator)),
            RankerMode::HistogramCe => Some(Box::new(HistogramEstimator)),
            RankerMode::AutomaticCe => Some(Box::new(AutomaticEstimator::default())),
        }
    }
}

impl fmt::Display for RankerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown plan ranker mode '{0}', expected one of multiPlanning, heuristicCE, histogramCE, automaticCE")]
pub struct UnknownModeError(pub String);

impl FromStr for RankerMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RankerMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownModeError(s.to_string()))
    }
}
