//! # In-Memory Store
//!
//! A `Store` over JSON rows held in memory. Declarative statements are
//! evaluated with the predicate evaluator; raw statements are parsed and
//! interpreted from their SQL text, so both renderings are exercised
//! independently.
//!
//! Faults and latency can be injected at named points, so timeout and
//! fallback paths can be driven deterministically in tests.

mod raw_eval;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::Value;

use super::{FetchQuery, Session, SessionMode, Store, StoreError, StoreFuture, StoreResult};
use crate::count::TableStatsSnapshot;
use crate::predicate::{matches, substring_relevance, text_rank, OrderKey, Predicate, SortDirection};
use crate::sql::RawQuery;

pub use raw_eval::{like_match, parse_count, CountStatement};

/// Points where a fault or a delay can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    OpenSession,
    TableStats,
    ColumnProbe,
    /// Declarative count
    Count,
    /// Raw exact count
    RawCount,
    /// Raw sampled count
    SampleCount,
    Fetch,
    Finish,
}

impl FaultPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultPoint::OpenSession => "open_session",
            FaultPoint::TableStats => "table_stats",
            FaultPoint::ColumnProbe => "column_probe",
            FaultPoint::Count => "count",
            FaultPoint::RawCount => "raw_count",
            FaultPoint::SampleCount => "sample_count",
            FaultPoint::Fetch => "fetch",
            FaultPoint::Finish => "finish",
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<String, Vec<Value>>,
    stats: HashMap<String, TableStatsSnapshot>,
    columns: HashSet<(String, String)>,
}

#[derive(Debug, Default)]
struct Injection {
    failing: HashSet<FaultPoint>,
    delays: HashMap<FaultPoint, Duration>,
    /// Every point reached, in order
    trace: Vec<FaultPoint>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    injection: Mutex<Injection>,
}

impl Shared {
    /// Record the point, sleep for its delay and fail if it is armed
    async fn reach(&self, point: FaultPoint) -> StoreResult<()> {
        let (delay, failing) = {
            let mut injection = self.injection.lock().unwrap_or_else(|e| e.into_inner());
            injection.trace.push(point);
            (
                injection.delays.get(&point).copied(),
                injection.failing.contains(&point),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(StoreError::Query(format!("injected fault at {}", point.as_str())));
        }
        Ok(())
    }

    fn rows(&self, table: &str) -> StoreResult<Vec<Value>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables
            .rows
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::Query(format!("relation \"{}\" does not exist", table)))
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a table
    pub fn insert_table(&self, table: impl Into<String>, rows: Vec<Value>) {
        let mut tables = self.shared.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.rows.insert(table.into(), rows);
    }

    /// Builder form of `insert_table`
    pub fn with_table(self, table: impl Into<String>, rows: Vec<Value>) -> Self {
        self.insert_table(table, rows);
        self
    }

    /// Report fixed statistics for a table instead of deriving them
    pub fn set_stats(&self, table: impl Into<String>, stats: TableStatsSnapshot) {
        let mut tables = self.shared.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.stats.insert(table.into(), stats);
    }

    /// Declare a column, such as a search column, that rows may not carry
    pub fn declare_column(&self, table: impl Into<String>, column: impl Into<String>) {
        let mut tables = self.shared.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.columns.insert((table.into(), column.into()));
    }

    /// Make every operation reaching `point` fail
    pub fn fail_at(&self, point: FaultPoint) {
        self.injection().failing.insert(point);
    }

    /// Delay every operation reaching `point`
    pub fn delay_at(&self, point: FaultPoint, delay: Duration) {
        self.injection().delays.insert(point, delay);
    }

    /// Remove all injected faults and delays
    pub fn clear_faults(&self) {
        let mut injection = self.injection();
        injection.failing.clear();
        injection.delays.clear();
    }

    /// Points reached so far, in order
    pub fn trace(&self) -> Vec<FaultPoint> {
        self.injection().trace.clone()
    }

    /// How many times `point` was reached
    pub fn hits(&self, point: FaultPoint) -> usize {
        self.injection().trace.iter().filter(|p| **p == point).count()
    }

    pub fn clear_trace(&self) {
        self.injection().trace.clear();
    }

    fn injection(&self) -> std::sync::MutexGuard<'_, Injection> {
        self.shared.injection.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    fn open_session(&self, mode: SessionMode) -> StoreFuture<'_, Box<dyn Session>> {
        Box::pin(async move {
            self.shared.reach(FaultPoint::OpenSession).await?;
            Ok(Box::new(MemorySession {
                shared: Arc::clone(&self.shared),
                mode,
            }) as Box<dyn Session>)
        })
    }

    fn table_stats<'a>(&'a self, table: &'a str) -> StoreFuture<'a, TableStatsSnapshot> {
        Box::pin(async move {
            self.shared.reach(FaultPoint::TableStats).await?;
            let tables = self.shared.tables.read().unwrap_or_else(|e| e.into_inner());
            if let Some(stats) = tables.stats.get(table) {
                return Ok(*stats);
            }
            let rows = tables
                .rows
                .get(table)
                .ok_or_else(|| StoreError::Query(format!("relation \"{}\" does not exist", table)))?;
            let bytes: usize = rows.iter().map(|r| r.to_string().len()).sum();
            Ok(TableStatsSnapshot::new(rows.len() as u64, 0, bytes as u64))
        })
    }

    fn column_exists<'a>(&'a self, table: &'a str, column: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.shared.reach(FaultPoint::ColumnProbe).await?;
            let tables = self.shared.tables.read().unwrap_or_else(|e| e.into_inner());
            if tables.columns.contains(&(table.to_string(), column.to_string())) {
                return Ok(true);
            }
            Ok(tables
                .rows
                .get(table)
                .is_some_and(|rows| rows.iter().any(|r| r.get(column).is_some())))
        })
    }
}

/// A session over the shared tables.
///
/// Every statement reads the current committed state, which is what READ
/// COMMITTED gives a single statement.
pub struct MemorySession {
    shared: Arc<Shared>,
    mode: SessionMode,
}

impl MemorySession {
    pub fn mode(&self) -> SessionMode {
        self.mode
    }
}

impl Session for MemorySession {
    fn count<'a>(&'a mut self, table: &'a str, predicate: &'a Predicate) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            self.shared.reach(FaultPoint::Count).await?;
            let rows = self.shared.rows(table)?;
            Ok(rows.iter().filter(|r| matches(predicate, r)).count() as u64)
        })
    }

    fn count_raw<'a>(&'a mut self, query: &'a RawQuery) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let statement = parse_count(&query.sql)?;
            let point = if statement.is_sample() {
                FaultPoint::SampleCount
            } else {
                FaultPoint::RawCount
            };
            self.shared.reach(point).await?;
            let rows = self.shared.rows(&statement.table)?;
            statement.count(&rows, &query.params)
        })
    }

    fn fetch<'a>(&'a mut self, query: &'a FetchQuery) -> StoreFuture<'a, Vec<Value>> {
        Box::pin(async move {
            self.shared.reach(FaultPoint::Fetch).await?;
            let mut rows: Vec<Value> = self
                .shared
                .rows(&query.table)?
                .into_iter()
                .filter(|r| matches(&query.predicate, r))
                .collect();

            rows.sort_by(|a, b| compare_rows(a, b, &query.order));

            Ok(rows
                .into_iter()
                .skip(usize::try_from(query.skip).unwrap_or(usize::MAX))
                .take(usize::try_from(query.take).unwrap_or(usize::MAX))
                .collect())
        })
    }

    fn finish(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move { self.shared.reach(FaultPoint::Finish).await })
    }
}

/// Order two rows by the given keys, the way PostgreSQL orders them
fn compare_rows(a: &Value, b: &Value, order: &[OrderKey]) -> Ordering {
    for key in order {
        let ord = match key {
            OrderKey::Field { field, direction } => {
                let a = a.get(field).unwrap_or(&Value::Null);
                let b = b.get(field).unwrap_or(&Value::Null);
                let ord = compare_values(a, b);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
            OrderKey::SubstringRank { fields, terms } => {
                substring_relevance(a, fields, terms).cmp(&substring_relevance(b, fields, terms))
            }
            OrderKey::TextRank { column, query } => {
                text_rank(b, column, query).cmp(&text_rank(a, column, query))
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Ascending comparison of two JSON values. NULL sorts last, so that
/// descending order puts it first, as PostgreSQL does by default.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}
