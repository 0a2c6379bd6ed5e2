//! # Store
//!
//! The executor seam of the engine. A `Store` hands out `Session`s; a session
//! runs counts and fetches either inside one READ COMMITTED transaction or in
//! autocommit mode.
//!
//! Two renderings of the same predicate reach a session:
//! - declarative: `count` and `fetch` take the `Predicate` tree itself
//! - raw: `count_raw` takes a `RawQuery` built by the `sql` compiler
//!
//! Backends must select the same rows for both.

mod errors;
pub mod memory;
pub mod postgres;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;

use crate::count::TableStatsSnapshot;
use crate::predicate::{OrderKey, Predicate};
use crate::sql::RawQuery;

pub use errors::{StoreError, StoreResult};
pub use memory::{FaultPoint, MemoryStore};
pub use postgres::PgStore;

/// Boxed future returned by store and session operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// How a session runs its statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    /// One READ COMMITTED transaction for the whole session
    ReadCommitted,
    /// Every statement commits on its own
    Autocommit,
}

/// A page fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchQuery {
    pub table: String,
    pub predicate: Predicate,
    pub order: Vec<OrderKey>,
    pub skip: u64,
    pub take: u64,
}

/// Source of sessions and of out-of-transaction metadata
pub trait Store: Send + Sync {
    /// Open a session
    fn open_session(&self, mode: SessionMode) -> StoreFuture<'_, Box<dyn Session>>;

    /// Planner statistics for a table, read outside any transaction
    fn table_stats<'a>(&'a self, table: &'a str) -> StoreFuture<'a, TableStatsSnapshot>;

    /// Whether `column` exists on `table`
    fn column_exists<'a>(&'a self, table: &'a str, column: &'a str) -> StoreFuture<'a, bool>;
}

/// One unit of work against the store
pub trait Session: Send {
    /// Declarative count of rows matching `predicate`
    fn count<'a>(&'a mut self, table: &'a str, predicate: &'a Predicate) -> StoreFuture<'a, u64>;

    /// Run a compiled `SELECT COUNT(*)` statement.
    ///
    /// Inside a transaction a failure must leave the transaction usable.
    fn count_raw<'a>(&'a mut self, query: &'a RawQuery) -> StoreFuture<'a, u64>;

    /// Fetch one page of rows as JSON objects
    fn fetch<'a>(&'a mut self, query: &'a FetchQuery) -> StoreFuture<'a, Vec<Value>>;

    /// Commit the transaction, if any, and release the connection
    fn finish(self: Box<Self>) -> StoreFuture<'static, ()>;
}
