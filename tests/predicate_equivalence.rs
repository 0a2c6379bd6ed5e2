//! Predicate Equivalence Tests
//!
//! The raw SQL compiled from a predicate must select the same rows as the
//! declarative predicate. The in-memory store evaluates the declarative tree
//! directly and interprets the compiled SQL text, so both are checked over
//! one fixed dataset. The PostgreSQL builder must render the same statement
//! text as the compiler.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use pagewise::predicate::{CompareOp, Predicate, SqlValue};
use pagewise::sql::RawPredicateCompiler;
use pagewise::store::postgres::count_statement;
use pagewise::store::{MemoryStore, Session, SessionMode, Store};

// =============================================================================
// Helper Functions
// =============================================================================

const ALICE: &str = "6f1c2a51-2b1d-4f57-9c4e-0d1e9d7f3a10";
const BOB: &str = "0b9e3d4c-77aa-4c0e-8f19-2a8c1b5e6d21";

fn dataset() -> Vec<Value> {
    vec![
        json!({"id": 1, "title": "Crash on save", "status": "open", "points": 3, "owner": ALICE,
               "created_at": "2024-01-05T10:00:00Z", "deleted_at": null, "search_vector": "crash on save"}),
        json!({"id": 2, "title": "50% CPU when idle", "status": "closed", "points": 8, "owner": BOB,
               "created_at": "2024-02-11T08:30:00Z", "deleted_at": null, "search_vector": "cpu idle"}),
        json!({"id": 3, "title": "snake_case keys", "status": "open", "points": null, "owner": ALICE,
               "created_at": "2024-03-01T00:00:00Z", "deleted_at": "2024-03-02T00:00:00Z"}),
        json!({"id": 4, "title": "CRASH", "status": "triage", "points": 1, "owner": null,
               "created_at": "2023-12-31T23:59:59Z", "deleted_at": null, "search_vector": "crash"}),
        json!({"id": 5, "title": "snakeXcase", "status": null, "points": 5, "owner": BOB,
               "created_at": null, "deleted_at": null}),
        json!({"id": 6, "title": "Login fails", "points": 2, "created_at": "2024-01-20T12:00:00Z"}),
    ]
}

fn predicates() -> Vec<(&'static str, Predicate)> {
    let jan_15 = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
    vec![
        ("always", Predicate::always()),
        ("never", Predicate::never()),
        ("equals text", Predicate::eq("status", SqlValue::text("open"))),
        ("equals int", Predicate::eq("points", SqlValue::Int(3))),
        ("equals uuid", Predicate::eq("owner", SqlValue::text(ALICE))),
        ("equals null", Predicate::eq("owner", SqlValue::Null)),
        ("is null", Predicate::is_null("deleted_at")),
        (
            "in list",
            Predicate::in_list("status", vec![SqlValue::text("open"), SqlValue::text("triage")]),
        ),
        ("in empty", Predicate::in_list("status", vec![])),
        ("in uuids", Predicate::in_list("owner", vec![SqlValue::text(BOB)])),
        ("gt", Predicate::compare("points", CompareOp::Gt, SqlValue::Int(2))),
        ("gte", Predicate::compare("points", CompareOp::Gte, SqlValue::Int(2))),
        ("lt float", Predicate::compare("points", CompareOp::Lt, SqlValue::Float(4.5))),
        ("lte", Predicate::compare("points", CompareOp::Lte, SqlValue::Int(1))),
        (
            "timestamp range",
            Predicate::compare("created_at", CompareOp::Gte, SqlValue::Timestamp(jan_15)),
        ),
        ("contains", Predicate::compare("title", CompareOp::Contains, SqlValue::text("crash"))),
        ("contains percent", Predicate::compare("title", CompareOp::Contains, SqlValue::text("50%"))),
        ("contains underscore", Predicate::compare("title", CompareOp::Contains, SqlValue::text("e_c"))),
        ("starts with", Predicate::compare("title", CompareOp::StartsWith, SqlValue::text("SNAKE"))),
        ("ends with", Predicate::compare("title", CompareOp::EndsWith, SqlValue::text("fails"))),
        ("iequals", Predicate::compare("title", CompareOp::IEquals, SqlValue::text("crash"))),
        ("matches", Predicate::compare("search_vector", CompareOp::Matches, SqlValue::text("crash save"))),
        (
            "in or null",
            Predicate::or_any([
                Predicate::in_list("status", vec![SqlValue::text("open")]),
                Predicate::is_null("status"),
            ]),
        ),
        ("not", Predicate::Not(Box::new(Predicate::eq("status", SqlValue::text("open"))))),
        (
            "or",
            Predicate::or_any([
                Predicate::eq("status", SqlValue::text("closed")),
                Predicate::compare("points", CompareOp::Lt, SqlValue::Int(2)),
            ]),
        ),
        (
            "nested",
            Predicate::and_all([
                Predicate::is_null("deleted_at"),
                Predicate::or_any([
                    Predicate::compare("title", CompareOp::Contains, SqlValue::text("crash")),
                    Predicate::eq("owner", SqlValue::text(BOB)),
                ]),
                Predicate::Not(Box::new(Predicate::in_list("status", vec![SqlValue::text("triage")]))),
            ]),
        ),
    ]
}

async fn counts(store: &MemoryStore, predicate: &Predicate) -> (u64, u64) {
    let mut session = store.open_session(SessionMode::Autocommit).await.unwrap();
    let declarative = session.count("bugs", predicate).await.unwrap();
    let raw = session
        .count_raw(&RawPredicateCompiler::count_query("bugs", predicate))
        .await
        .unwrap();
    (declarative, raw)
}

// =============================================================================
// Equivalence Tests
// =============================================================================

/// Raw and declarative counts agree for every operator.
#[tokio::test]
async fn test_raw_and_declarative_counts_agree() {
    let store = MemoryStore::new().with_table("bugs", dataset());

    for (name, predicate) in predicates() {
        let (declarative, raw) = counts(&store, &predicate).await;
        assert_eq!(declarative, raw, "predicate '{}' diverged", name);
    }
}

/// The equivalence is not vacuous: the operators select what they should.
#[tokio::test]
async fn test_known_counts() {
    let store = MemoryStore::new().with_table("bugs", dataset());
    let expected = [
        ("always", 6),
        ("never", 0),
        ("equals uuid", 2),
        ("in empty", 0),
        ("contains", 2),
        ("contains percent", 1),
        ("contains underscore", 1),
        ("starts with", 2),
        ("iequals", 1),
        ("matches", 1),
        ("timestamp range", 3),
        ("in or null", 4),
    ];

    let all = predicates();
    for (name, count) in expected {
        let predicate = &all.iter().find(|(n, _)| *n == name).unwrap().1;
        assert_eq!(counts(&store, predicate).await, (count, count), "predicate '{}'", name);
    }
}

/// NULL comparisons are unknown, and NOT of unknown stays unknown.
#[tokio::test]
async fn test_three_valued_logic() {
    let store = MemoryStore::new().with_table("bugs", dataset());

    // status: open, closed, open, triage, null, missing
    let not_open = Predicate::Not(Box::new(Predicate::eq("status", SqlValue::text("open"))));
    assert_eq!(counts(&store, &not_open).await, (2, 2));
}

/// A sample limit above the match count is an exact count.
#[tokio::test]
async fn test_sample_with_large_limit_is_exact() {
    let store = MemoryStore::new().with_table("bugs", dataset());
    let mut session = store.open_session(SessionMode::Autocommit).await.unwrap();

    for (name, predicate) in predicates() {
        let exact = session.count("bugs", &predicate).await.unwrap();
        let sampled = session
            .count_raw(&RawPredicateCompiler::sample_count_query("bugs", &predicate, 1000))
            .await
            .unwrap();
        assert_eq!(exact, sampled, "predicate '{}'", name);

        let capped = session
            .count_raw(&RawPredicateCompiler::sample_count_query("bugs", &predicate, 1))
            .await
            .unwrap();
        assert_eq!(capped, exact.min(1), "predicate '{}'", name);
    }
}

/// Non-UUID text on an identifier field is bound without a cast.
#[tokio::test]
async fn test_uuid_cast_only_for_uuid_literals() {
    let store = MemoryStore::new().with_table("bugs", dataset());
    let predicate = Predicate::eq("owner", SqlValue::text("not-a-uuid"));
    let raw = RawPredicateCompiler::count_query("bugs", &predicate);
    assert!(!raw.sql.contains("::uuid"));

    let (declarative, raw) = counts(&store, &predicate).await;
    assert_eq!((declarative, raw), (0, 0));
}

// =============================================================================
// PostgreSQL Rendering
// =============================================================================

/// The sqlx builder and the raw compiler emit identical statements.
#[test]
fn test_postgres_builder_matches_compiler() {
    for (name, predicate) in predicates() {
        let declarative = count_statement("bugs", &predicate);
        let raw = RawPredicateCompiler::count_query("bugs", &predicate);
        assert_eq!(declarative.sql(), raw.sql, "predicate '{}'", name);
    }
}
