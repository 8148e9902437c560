//! docrank - cost-based plan ranking for a document database
//!
//! Filters over JSON documents are enumerated into candidate plans and
//! ranked either by running them for a trial period or by estimating the
//! cardinality and cost of every plan node from heuristics or histograms.
//!
//! # Example
//!
//! ```no_run
//! use docrank::db::{Database, FindOptions};
//! use docrank::ranker::RankerMode;
//! use serde_json::json;
//!
//! let db = Database::new();
//! db.insert_many("users", (0..100).map(|i| json!({"age": i}))).unwrap();
//! db.create_index("users", vec!["age".into()]).unwrap();
//! db.analyze("users", "age", Some(10)).unwrap();
//!
//! let options = FindOptions::default().mode(RankerMode::HistogramCe);
//! let explain = db.explain("users", &json!({"age": {"$gt": 90}}), options).unwrap();
//! println!("{explain:#}");
//! ```

pub mod ce;
pub mod db;
pub mod executor;
pub mod planner;
pub mod query;
pub mod ranker;
pub mod stats;
pub mod storage;
