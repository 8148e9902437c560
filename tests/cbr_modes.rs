//! Plan ranking across the ranker modes, driven through the database API.

use docrank::db::{Database, DatabaseError, FindOptions, Verbosity};
use docrank::ranker::RankerMode;
use serde_json::{json, Value};

const COST_BASED: [RankerMode; 3] = [
    RankerMode::HeuristicCe,
    RankerMode::HistogramCe,
    RankerMode::AutomaticCe,
];

/// Half of the documents favour an index on `a`, the other half one on `b`.
fn skewed_database() -> Database {
    let db = Database::new();
    db.insert_many("coll", (0..5000).map(|i| json!({"a": 1, "b": i, "c": i % 7})))
        .unwrap();
    db.insert_many("coll", (0..5000).map(|i| json!({"a": i, "b": 1, "c": i % 3})))
        .unwrap();

    for pattern in [vec!["a"], vec!["b"], vec!["c", "b", "a"], vec!["a", "b"], vec!["c", "a"]] {
        db.create_index("coll", pattern.into_iter().map(String::from).collect())
            .unwrap();
    }
    for key in ["a", "b", "c"] {
        db.analyze("coll", key, Some(10)).unwrap();
    }
    db
}

fn explain(db: &Database, collection: &str, filter: &Value, mode: RankerMode) -> Result<Value, DatabaseError> {
    let options = FindOptions::default()
        .mode(mode)
        .verbosity(Verbosity::ExecutionStats);
    db.explain(collection, filter, options)
}

fn winning_plan(explain: &Value) -> &Value {
    &explain["queryPlanner"]["winningPlan"]
}

fn rejected_plans(explain: &Value) -> &Vec<Value> {
    explain["queryPlanner"]["rejectedPlans"].as_array().unwrap()
}

fn assert_estimated(node: &Value) {
    let stage = &node["stage"];
    let cardinality = node["cardinalityEstimate"].as_f64();
    let cost = node["costEstimate"].as_f64();
    assert!(cardinality.is_some_and(|c| c > 0.0), "{stage} has no cardinality: {node}");
    assert!(cost.is_some_and(|c| c > 0.0), "{stage} has no cost: {node}");

    if let Some(child) = node.get("inputStage") {
        assert_estimated(child);
    }
    for child in node.get("inputStages").and_then(Value::as_array).into_iter().flatten() {
        assert_estimated(child);
    }
}

fn contains_stage(node: &Value, stage: &str) -> bool {
    if node["stage"] == stage {
        return true;
    }
    let single = node.get("inputStage").into_iter();
    let many = node.get("inputStages").and_then(Value::as_array).into_iter().flatten();
    single.chain(many).any(|child| contains_stage(child, stage))
}

fn execution_counters(explain: &Value) -> (u64, u64, u64) {
    let stats = &explain["executionStats"];
    (
        stats["totalKeysExamined"].as_u64().unwrap(),
        stats["totalDocsExamined"].as_u64().unwrap(),
        stats["executionStages"]["works"].as_u64().unwrap(),
    )
}

/// Cost-based ranking must do no more work than execution-based ranking.
fn check_winning_plan(db: &Database, filter: Value) {
    let rooted_or = filter.as_object().is_some_and(|o| o.len() == 1 && o.contains_key("$or"));

    let multi = explain(db, "coll", &filter, RankerMode::MultiPlanning).unwrap();
    let cbr = explain(db, "coll", &filter, RankerMode::AutomaticCe).unwrap();

    if !rooted_or {
        assert_estimated(winning_plan(&cbr));
        assert!(!rejected_plans(&multi).is_empty(), "{filter}");
        assert_eq!(rejected_plans(&multi).len(), rejected_plans(&cbr).len(), "{filter}");
    }
    rejected_plans(&cbr).iter().for_each(assert_estimated);

    let (mp_keys, mp_docs, mp_works) = execution_counters(&multi);
    let (cbr_keys, cbr_docs, cbr_works) = execution_counters(&cbr);
    assert!(cbr_keys <= mp_keys, "{filter}: keys {cbr_keys} > {mp_keys}");
    assert!(cbr_docs <= mp_docs, "{filter}: docs {cbr_docs} > {mp_docs}");
    assert!(cbr_works <= mp_works, "{filter}: works {cbr_works} > {mp_works}");
    assert_eq!(
        multi["executionStats"]["nReturned"],
        cbr["executionStats"]["nReturned"],
        "{filter}"
    );
}

fn q1() -> Value {
    json!({"a": {"$gt": 10}, "b": {"$eq": 99}})
}

fn q2() -> Value {
    json!({"a": {"$in": [5, 1]}, "b": {"$in": [7, 99]}})
}

#[test]
fn range_and_equality() {
    check_winning_plan(&skewed_database(), q1());
}

#[test]
fn two_in_lists() {
    check_winning_plan(&skewed_database(), q2());
}

#[test]
fn three_term_conjunction() {
    check_winning_plan(
        &skewed_database(),
        json!({"a": {"$gt": 90}, "b": {"$eq": 99}, "c": {"$lt": 5}}),
    );
}

#[test]
fn disjunction_of_conjunctions() {
    check_winning_plan(&skewed_database(), json!({"$or": [q1(), q2()]}));
}

#[test]
fn conjunction_of_disjunctions() {
    let filter = json!({"$and": [
        {"$or": [{"a": 10}, {"b": {"$gt": 99}}]},
        {"$or": [{"a": {"$in": [5, 1]}}, {"b": {"$in": [7, 99]}}]},
    ]});
    check_winning_plan(&skewed_database(), filter);
}

#[test]
fn rejected_plan_count_does_not_depend_on_mode() {
    let db = skewed_database();
    for filter in [q1(), q2()] {
        let expected = rejected_plans(&explain(&db, "coll", &filter, RankerMode::MultiPlanning).unwrap()).len();
        for mode in COST_BASED {
            let doc = explain(&db, "coll", &filter, mode).unwrap();
            assert_eq!(rejected_plans(&doc).len(), expected, "{mode} {filter}");
            assert_eq!(doc["queryPlanner"]["planRankerMode"], mode.as_str());
        }
    }
}

#[test]
fn ranking_is_repeatable() {
    let db = skewed_database();
    let rooted_or = json!({"$or": [q1(), q2()]});
    for filter in [q2(), rooted_or] {
        for mode in RankerMode::ALL {
            let first = explain(&db, "coll", &filter, mode).unwrap();
            let second = explain(&db, "coll", &filter, mode).unwrap();
            assert_eq!(first["queryPlanner"], second["queryPlanner"], "{mode} {filter}");
        }
    }
}

#[test]
fn collection_scan_uses_exact_count() {
    let db = Database::new();
    db.insert_many("coll", (0..1234).map(|_| json!({"a": 1}))).unwrap();

    for mode in RankerMode::ALL {
        let doc = explain(&db, "coll", &json!({}), mode).unwrap();
        let winning = winning_plan(&doc);
        assert_eq!(winning["stage"], "COLLSCAN", "{mode}");
        assert_eq!(winning["cardinalityEstimate"], json!(1234.0), "{mode}");
    }
}

#[test]
fn heuristic_estimate_source() {
    let db = Database::new();
    db.insert("coll", json!({"a": 1})).unwrap();
    db.create_index("coll", vec!["a".into()]).unwrap();

    let doc = explain(&db, "coll", &json!({"a": 1}), RankerMode::HeuristicCe).unwrap();
    assert_eq!(winning_plan(&doc)["estimatesMetadata"]["ceSource"], "Heuristics");
}

#[test]
fn strict_histogram_mode() {
    let db = Database::new();
    db.insert("coll1", json!({"a": 1})).unwrap();
    let _mode = db.override_mode(RankerMode::HistogramCe);
    let explain = |filter: Value| db.explain("coll1", &filter, FindOptions::default());

    // No histogram at all.
    let err = explain(json!({"a": 1})).unwrap_err();
    assert!(err.is_histogram_ce_failure(), "{err}");

    {
        let _mode = db.override_mode(RankerMode::MultiPlanning);
        db.analyze("coll1", "b", None).unwrap();
    }
    assert_eq!(db.ranker_mode(), RankerMode::HistogramCe);

    assert!(explain(json!({"a": 1})).unwrap_err().is_histogram_ce_failure());
    assert!(explain(json!({"$and": [{"b": 1}, {"a": 3}]}))
        .unwrap_err()
        .is_histogram_ce_failure());

    // The failure of the "a" branch is masked by whole-query planning.
    let doc = explain(json!({"$or": [{"b": 1}, {"a": 3}]})).unwrap();
    assert!(contains_stage(winning_plan(&doc), "COLLSCAN"));

    // Inexact interval.
    assert!(explain(json!({"b": {"$gt": []}})).unwrap_err().is_histogram_ce_failure());
    // Interval outside the estimable domain.
    assert!(explain(json!({"b": {"$gte": {"foo": 1}}}))
        .unwrap_err()
        .is_histogram_ce_failure());

    // The histogram on "b" is enough on its own.
    assert!(explain(json!({"b": {"$lt": 5}})).is_ok());
}

#[test]
fn automatic_mode_never_fails() {
    let db = Database::new();
    db.insert_many("coll1", (0..50).map(|i| json!({"a": i, "b": i % 5}))).unwrap();
    db.create_index("coll1", vec!["a".into()]).unwrap();
    db.analyze("coll1", "b", Some(5)).unwrap();

    for filter in [
        json!({"a": 1}),
        json!({"a": {"$gt": 3}, "b": 2}),
        json!({"b": {"$gt": []}}),
        json!({"b": {"$gte": {"foo": 1}}}),
    ] {
        let doc = explain(&db, "coll1", &filter, RankerMode::AutomaticCe).unwrap();
        assert_estimated(winning_plan(&doc));
    }

    let doc = explain(&db, "coll1", &json!({"a": {"$gt": 3}, "b": 2}), RankerMode::AutomaticCe).unwrap();
    assert_eq!(winning_plan(&doc)["estimatesMetadata"]["ceSource"], "Mixed");
}

#[test]
fn mode_override_restores_after_failure() {
    let db = Database::new();
    db.insert("coll1", json!({"a": 1})).unwrap();

    let result = (|| -> Result<Value, DatabaseError> {
        let _mode = db.override_mode(RankerMode::HistogramCe);
        db.explain("coll1", &json!({"a": 1}), FindOptions::default())
    })();
    assert!(result.unwrap_err().is_histogram_ce_failure());
    assert_eq!(db.ranker_mode(), RankerMode::MultiPlanning);
}

#[test]
fn modes_return_the_same_documents() {
    let db = skewed_database();
    let filter = json!({"a": {"$in": [5, 1]}, "b": {"$lt": 10}});
    let mut counts = Vec::new();
    for mode in RankerMode::ALL {
        let options = FindOptions::default().mode(mode);
        counts.push(db.find_with_options("coll", &filter, options).unwrap().len());
    }
    // Ten documents of the first half, plus a=1 and a=5 of the second.
    assert!(counts.iter().all(|&n| n == 12), "{counts:?}");
}
