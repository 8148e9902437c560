//! docrank - explain how a filter is planned over a JSON data set.
//!
//! This is the main entry point for the docrank command-line interface.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use docrank::db::{Database, DatabaseConfig, FindOptions, Verbosity};
use docrank::ranker::RankerMode;
use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const COLLECTION: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "docrank", version, about = "Cost-based plan ranking for a document database")]
#[command(after_help = "Example:\n  docrank -d docs.json -i a -i b -a a:10 -m histogramCE -q '{\"a\": {\"$gt\": 10}}'")]
struct Args {
    /// JSON array of documents to load
    #[arg(short, long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Collection name
    #[arg(short, long, default_value = COLLECTION)]
    collection: String,

    /// Create an index on comma-separated fields (repeatable)
    #[arg(short, long = "index", value_name = "a,b")]
    indexes: Vec<KeyPattern>,

    /// Build a histogram with N buckets (repeatable)
    #[arg(short, long, value_name = "FIELD[:N]")]
    analyze: Vec<AnalyzeField>,

    /// multiPlanning, heuristicCE, histogramCE or automaticCE
    #[arg(short, long)]
    mode: Option<RankerMode>,

    /// Filter document to explain
    #[arg(short, long, value_name = "FILTER")]
    query: Option<String>,

    /// Also run the winning plan and report its stats
    #[arg(short, long)]
    execute: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Histogram file to load and update
    #[arg(long = "stats", value_name = "FILE")]
    statistics: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Fields of an index, `a,b`.
#[derive(Debug, Clone)]
struct KeyPattern(Vec<String>);

impl FromStr for KeyPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<String> = s.split(',').map(|f| f.trim().to_string()).collect();
        if fields.iter().any(String::is_empty) {
            return Err(format!("empty field in index '{}'", s));
        }
        Ok(Self(fields))
    }
}

/// `field` or `field:buckets`.
#[derive(Debug, Clone)]
struct AnalyzeField {
    field: String,
    buckets: Option<usize>,
}

impl FromStr for AnalyzeField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((field, buckets)) => {
                let buckets = buckets
                    .parse()
                    .map_err(|_| format!("invalid bucket count '{}'", buckets))?;
                Ok(Self {
                    field: field.to_string(),
                    buckets: Some(buckets),
                })
            }
            None => Ok(Self {
                field: s.to_string(),
                buckets: None,
            }),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "docrank=debug" } else { "docrank=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => DatabaseConfig::from_file(path)?,
        None => DatabaseConfig::default(),
    };
    if let Some(path) = args.statistics {
        config = config.statistics_path(path);
    }
    let db = Database::with_config(config)?;
    let collection = args.collection.as_str();

    match &args.data {
        Some(path) => {
            let docs: Vec<Value> = serde_json::from_slice(&fs::read(path)?)?;
            let count = db.insert_many(collection, docs)?;
            tracing::info!(count, collection, "loaded documents");
        }
        None => db.create_collection(collection)?,
    }
    for KeyPattern(fields) in args.indexes {
        db.create_index(collection, fields)?;
    }
    for AnalyzeField { field, buckets } in &args.analyze {
        db.analyze(collection, field, *buckets)?;
    }

    let Some(query) = args.query else {
        return Ok(());
    };
    let filter: Value = serde_json::from_str(&query)?;
    let mut find = FindOptions::default();
    if let Some(mode) = args.mode {
        find = find.mode(mode);
    }
    if args.execute {
        find = find.verbosity(Verbosity::ExecutionStats);
    }

    let explain = db.explain(collection, &filter, find)?;
    println!("{}", serde_json::to_string_pretty(&explain)?);
    Ok(())
}
