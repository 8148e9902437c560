//! Shared histogram store.
//!
//! The store holds an immutable map of histograms behind an `Arc`.
//! Publishing a histogram clones the map, inserts the new entry and swaps
//! the pointer, so a `HistogramSnapshot` taken by a compile never changes
//! underneath it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::error::StatsResult;
use super::histogram::Histogram;

type HistogramMap = BTreeMap<(String, String), Arc<Histogram>>;

/// A consistent read-only view of every histogram.
#[derive(Debug, Clone, Default)]
pub struct HistogramSnapshot {
    histograms: Arc<HistogramMap>,
}

impl HistogramSnapshot {
    pub fn get(&self, collection: &str, field: &str) -> Option<&Arc<Histogram>> {
        self.histograms
            .get(&(collection.to_string(), field.to_string()))
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
}

/// Read-mostly registry of histograms.
#[derive(Debug, Default)]
pub struct HistogramStore {
    current: RwLock<Arc<HistogramMap>>,
}

impl HistogramStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current set of histograms.
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            histograms: Arc::clone(&self.current.read()),
        }
    }

    /// Publish a histogram, replacing any previous one for the same field.
    pub fn publish(&self, histogram: Histogram) {
        let key = (histogram.collection.clone(), histogram.field.clone());
        let mut current = self.current.write();
        let mut next: HistogramMap = (**current).clone();
        next.insert(key, Arc::new(histogram));
        *current = Arc::new(next);
    }

    /// Drop every histogram of a collection.
    pub fn remove_collection(&self, collection: &str) {
        let mut current = self.current.write();
        let next: HistogramMap = current
            .iter()
            .filter(|((coll, _), _)| coll != collection)
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        *current = Arc::new(next);
    }

    /// Persist all histograms as a JSON array.
    pub fn save(&self, path: impl AsRef<Path>) -> StatsResult<()> {
        let snapshot = self.snapshot();
        let histograms: Vec<&Histogram> = snapshot.histograms.values().map(|h| h.as_ref()).collect();
        let bytes = serde_json::to_vec_pretty(&histograms)?;
        fs::write(path.as_ref(), bytes)?;
        info!(path = %path.as_ref().display(), count = histograms.len(), "saved histograms");
        Ok(())
    }

    /// Load histograms written by [`HistogramStore::save`].
    pub fn load(path: impl AsRef<Path>) -> StatsResult<Self> {
        let bytes = fs::read(path.as_ref())?;
        let histograms: Vec<Histogram> = serde_json::from_slice(&bytes)?;
        let count = histograms.len();
        let map: HistogramMap = histograms
            .into_iter()
            .map(|h| ((h.collection.clone(), h.field.clone()), Arc::new(h)))
            .collect();
        info!(path = %path.as_ref().display(), count, "loaded histograms");
        Ok(Self {
            current: RwLock::new(Arc::new(map)),
        })
    }
}
