//! Database API - high-level interface for docrank.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, info_span};
use ulid::Ulid;

use super::explain::{explain_document, Verbosity};
use crate::ce::HistogramCeFailure;
use crate::executor::{ExecuteError, PlanExecutor, ResultSet};
use crate::planner::DEFAULT_MAX_OR_SOLUTIONS;
use crate::query::{get_path, ParseError, Parser, Predicate};
use crate::ranker::{PlanRanker, RankError, RankedPlanSet, RankerMode, TrialConfig};
use crate::stats::{Histogram, HistogramStore, StatsError};
use crate::storage::{Collection, CollectionName, RecordId, StorageError};

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("ranking error: {0}")]
    Rank(#[from] RankError),

    #[error("execution error: {0}")]
    Execute(#[from] ExecuteError),

    #[error("statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    /// The histogram estimation failure behind this error, if any.
    pub fn histogram_ce_failure(&self) -> Option<&HistogramCeFailure> {
        match self {
            DatabaseError::Rank(RankError::HistogramCe(failure)) => Some(failure),
            _ => None,
        }
    }

    pub fn is_histogram_ce_failure(&self) -> bool {
        self.histogram_ce_failure().is_some()
    }
}

/// Database configuration options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Ranker mode used when a query does not pick one.
    pub default_mode: RankerMode,
    /// Histogram buckets when `analyze` is not given a count.
    pub default_bucket_count: usize,
    /// Cap on `$or` solutions per disjunction.
    pub max_or_solutions: usize,
    /// Trial limits for execution-based ranking.
    pub trial: TrialConfig,
    /// File the histograms are loaded from and saved to after `analyze`.
    pub statistics_path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_mode: RankerMode::default(),
            default_bucket_count: 100,
            max_or_solutions: DEFAULT_MAX_OR_SOLUTIONS,
            trial: TrialConfig::default(),
            statistics_path: None,
        }
    }
}

impl DatabaseConfig {
    /// Read a configuration from a JSON file. Missing keys keep their
    /// defaults.
    pub fn from_file(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let bytes = fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_mode(mut self, mode: RankerMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn default_bucket_count(mut self, buckets: usize) -> Self {
        self.default_bucket_count = buckets;
        self
    }

    pub fn max_or_solutions(mut self, max: usize) -> Self {
        self.max_or_solutions = max;
        self
    }

    pub fn trial(mut self, trial: TrialConfig) -> Self {
        self.trial = trial;
        self
    }

    pub fn statistics_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.statistics_path = Some(path.into());
        self
    }

    fn validate(&self) -> DatabaseResult<()> {
        if self.default_bucket_count == 0 {
            return Err(DatabaseError::InvalidConfig(
                "default_bucket_count must be at least 1".into(),
            ));
        }
        if self.max_or_solutions == 0 {
            return Err(DatabaseError::InvalidConfig(
                "max_or_solutions must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.trial.collection_fraction) {
            return Err(DatabaseError::InvalidConfig(format!(
                "trial.collection_fraction must be within [0, 1], got {}",
                self.trial.collection_fraction
            )));
        }
        Ok(())
    }
}

/// Per-query options.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    /// Overrides the database's ranker mode for this query.
    pub mode: Option<RankerMode>,
    pub verbosity: Verbosity,
}

impl FindOptions {
    pub fn mode(mut self, mode: RankerMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

/// Restores the previous ranker mode when dropped.
pub struct ModeOverride<'a> {
    db: &'a Database,
    previous: RankerMode,
}

impl Drop for ModeOverride<'_> {
    fn drop(&mut self) {
        self.db.set_ranker_mode(self.previous);
    }
}

/// The main database handle.
pub struct Database {
    config: DatabaseConfig,
    collections: RwLock<BTreeMap<String, Arc<RwLock<Collection>>>>,
    statistics: HistogramStore,
    mode: RwLock<RankerMode>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// An empty database with the default configuration.
    pub fn new() -> Self {
        let config = DatabaseConfig::default();
        Self {
            mode: RwLock::new(config.default_mode),
            config,
            collections: RwLock::new(BTreeMap::new()),
            statistics: HistogramStore::new(),
        }
    }

    /// An empty database. Histograms are loaded from the configured
    /// statistics file when it exists.
    pub fn with_config(config: DatabaseConfig) -> DatabaseResult<Self> {
        config.validate()?;
        let statistics = match &config.statistics_path {
            Some(path) if path.exists() => HistogramStore::load(path)?,
            _ => HistogramStore::new(),
        };
        Ok(Self {
            mode: RwLock::new(config.default_mode),
            config,
            collections: RwLock::new(BTreeMap::new()),
            statistics,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn ranker_mode(&self) -> RankerMode {
        *self.mode.read()
    }

    pub fn set_ranker_mode(&self, mode: RankerMode) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            info!(from = %previous, to = %mode, "plan ranker mode changed");
        }
    }

    /// Switch the ranker mode until the returned guard is dropped.
    pub fn override_mode(&self, mode: RankerMode) -> ModeOverride<'_> {
        let previous = self.ranker_mode();
        self.set_ranker_mode(mode);
        ModeOverride { db: self, previous }
    }

    pub fn create_collection(&self, name: &str) -> DatabaseResult<()> {
        let name = CollectionName::new(name).map_err(StorageError::from)?;
        let mut collections = self.collections.write();
        if collections.contains_key(name.as_str()) {
            return Err(StorageError::CollectionAlreadyExists(name.to_string()).into());
        }
        debug!(collection = %name, "created collection");
        collections.insert(name.to_string(), Arc::new(RwLock::new(Collection::new(name))));
        Ok(())
    }

    /// Drop a collection and its histograms.
    pub fn drop_collection(&self, name: &str) -> DatabaseResult<()> {
        self.collections
            .write()
            .remove(name)
            .ok_or_else(|| StorageError::CollectionNotFound(name.to_string()))?;
        self.statistics.remove_collection(name);
        Ok(())
    }

    /// List all collections.
    pub fn collections(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Insert a document, creating the collection when needed.
    pub fn insert(&self, collection: &str, doc: Value) -> DatabaseResult<RecordId> {
        let handle = self.collection_or_create(collection)?;
        let mut coll = handle.write();
        Ok(coll.insert(doc)?)
    }

    pub fn insert_many(&self, collection: &str, docs: impl IntoIterator<Item = Value>) -> DatabaseResult<usize> {
        let handle = self.collection_or_create(collection)?;
        let mut coll = handle.write();
        Ok(coll.insert_many(docs)?)
    }

    /// Create an index and return its name.
    pub fn create_index(&self, collection: &str, key_pattern: Vec<String>) -> DatabaseResult<String> {
        let handle = self.collection_or_create(collection)?;
        let mut coll = handle.write();
        Ok(coll.create_index(key_pattern)?.name.clone())
    }

    /// Build a histogram over `key` and publish it. Uses the configured
    /// bucket count when `buckets` is `None`.
    pub fn analyze(&self, collection: &str, key: &str, buckets: Option<usize>) -> DatabaseResult<()> {
        let handle = self.collection(collection)?;
        let buckets = buckets.unwrap_or(self.config.default_bucket_count);
        let histogram = {
            let coll = handle.read();
            Histogram::build(
                collection,
                key,
                coll.iter().map(|(_, doc)| get_path(doc, key)),
                buckets,
            )?
        };
        info!(
            collection,
            key,
            buckets = histogram.buckets.len(),
            documents = histogram.document_count,
            "analyzed field"
        );
        self.statistics.publish(histogram);

        if let Some(path) = &self.config.statistics_path {
            self.statistics.save(path)?;
        }
        Ok(())
    }

    /// Persist all histograms to a file.
    pub fn save_statistics(&self, path: impl AsRef<Path>) -> DatabaseResult<()> {
        Ok(self.statistics.save(path)?)
    }

    /// Run a query with the current ranker mode.
    pub fn find(&self, collection: &str, filter: &Value) -> DatabaseResult<ResultSet> {
        self.find_with_options(collection, filter, FindOptions::default())
    }

    pub fn find_with_options(
        &self,
        collection: &str,
        filter: &Value,
        options: FindOptions,
    ) -> DatabaseResult<ResultSet> {
        let predicate = Parser::parse(filter)?;
        let handle = self.collection(collection)?;
        let coll = handle.read();
        let ranked = self.compile(&coll, &predicate, options.mode)?;

        let mut executor = PlanExecutor::new(&coll, &ranked.winner.solution)?;
        executor.run_to_completion()?;
        Ok(executor.results()?)
    }

    /// Explain how a query would be planned, and at
    /// [`Verbosity::ExecutionStats`] how the winning plan executes.
    pub fn explain(&self, collection: &str, filter: &Value, options: FindOptions) -> DatabaseResult<Value> {
        let predicate = Parser::parse(filter)?;
        let handle = self.collection(collection)?;
        let coll = handle.read();
        let ranked = self.compile(&coll, &predicate, options.mode)?;

        let execution = match options.verbosity {
            Verbosity::QueryPlanner => None,
            Verbosity::ExecutionStats => {
                let mut executor = PlanExecutor::new(&coll, &ranked.winner.solution)?;
                executor.run_to_completion()?;
                Some(executor.stats())
            }
        };
        Ok(explain_document(collection, &predicate, &ranked, execution.as_ref())?)
    }

    /// Enumerate and rank the plans of a predicate.
    fn compile(&self, coll: &Collection, predicate: &Predicate, mode: Option<RankerMode>) -> DatabaseResult<RankedPlanSet> {
        let mode = mode.unwrap_or_else(|| self.ranker_mode());
        let compile_id = Ulid::new();
        let span = info_span!("compile", id = %compile_id, collection = %coll.name(), %mode);
        let _enter = span.enter();

        let histograms = self.statistics.snapshot();
        let ranked = PlanRanker::new(coll, &histograms, mode)
            .with_trial_config(self.config.trial)
            .with_max_or_solutions(self.config.max_or_solutions)
            .rank(predicate)?;
        debug!(
            winner = %ranked.winner.solution.summary(),
            rejected = ranked.rejected.len(),
            source = %ranked.source,
            "compiled query"
        );
        Ok(ranked)
    }

    fn collection(&self, name: &str) -> DatabaseResult<Arc<RwLock<Collection>>> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::CollectionNotFound(name.to_string()).into())
    }

    fn collection_or_create(&self, name: &str) -> DatabaseResult<Arc<RwLock<Collection>>> {
        if let Some(handle) = self.collections.read().get(name) {
            return Ok(Arc::clone(handle));
        }
        let name = CollectionName::new(name).map_err(StorageError::from)?;
        let mut collections = self.collections.write();
        let handle = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Collection::new(name))));
        Ok(Arc::clone(handle))
    }
}
