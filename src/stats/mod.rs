//! Field statistics.
//!
//! Histograms are built by scanning one field of a collection and are
//! published into a [`HistogramStore`]. Estimators read them through a
//! [`HistogramSnapshot`] taken once per query compile.

mod error;
mod histogram;
mod store;

pub use error::{StatsError, StatsResult};
pub use histogram::{Bucket, Histogram};
pub use store::{HistogramSnapshot, HistogramStore};
