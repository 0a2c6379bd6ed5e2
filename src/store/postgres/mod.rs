//! # PostgreSQL Store
//!
//! `sqlx` backend. Sessions are either one READ COMMITTED transaction or a
//! plain pooled connection. Raw statements inside a transaction run under a
//! savepoint, so a failed statement rolls back to the savepoint and the
//! transaction stays usable for the fallback.

mod declarative;

use std::time::{Duration, Instant};

use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnection, PgPoolOptions};
use sqlx::query::QueryScalar;
use sqlx::{Connection, PgPool, Postgres, Transaction};

use super::{FetchQuery, Session, SessionMode, Store, StoreError, StoreFuture, StoreResult};
use crate::count::TableStatsSnapshot;
use crate::predicate::Predicate;
use crate::sql::{Ident, RawQuery, SqlParam};

pub use declarative::{count_statement, fetch_statement, push_predicate};

/// Statements slower than this are logged (default: 500ms)
pub const DEFAULT_SLOW_STATEMENT: Duration = Duration::from_millis(500);

const TABLE_STATS_SQL: &str = "SELECT GREATEST(c.reltuples, 0)::bigint AS live_rows, \
     COALESCE(s.n_dead_tup, 0)::bigint AS dead_rows, \
     pg_total_relation_size(c.oid)::bigint AS approx_bytes \
     FROM pg_class c LEFT JOIN pg_stat_user_tables s ON s.relid = c.oid \
     WHERE c.oid = to_regclass($1)";

const COLUMN_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.columns \
     WHERE table_name = $1 AND column_name = $2 \
     AND ($3::text IS NULL OR table_schema = $3))";

/// PostgreSQL store over a connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    slow_statement: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            slow_statement: DEFAULT_SLOW_STATEMENT,
        }
    }

    /// Connect a new pool.
    ///
    /// `acquire_timeout` bounds every connection checkout.
    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn with_slow_statement_threshold(mut self, threshold: Duration) -> Self {
        self.slow_statement = threshold;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    fn open_session(&self, mode: SessionMode) -> StoreFuture<'_, Box<dyn Session>> {
        Box::pin(async move {
            let conn = match mode {
                SessionMode::ReadCommitted => {
                    let mut tx = self.pool.begin().await?;
                    sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
                        .execute(&mut *tx)
                        .await?;
                    Conn::Tx(tx)
                }
                SessionMode::Autocommit => Conn::Plain(self.pool.acquire().await?),
            };
            Ok(Box::new(PgSession {
                conn,
                slow_statement: self.slow_statement,
            }) as Box<dyn Session>)
        })
    }

    fn table_stats<'a>(&'a self, table: &'a str) -> StoreFuture<'a, TableStatsSnapshot> {
        Box::pin(async move {
            let row: Option<(i64, i64, i64)> = sqlx::query_as(TABLE_STATS_SQL)
                .bind(Ident::table(table).to_string())
                .fetch_optional(&self.pool)
                .await?;
            let (live, dead, bytes) =
                row.ok_or_else(|| StoreError::Query(format!("relation \"{}\" does not exist", table)))?;
            Ok(TableStatsSnapshot::new(
                live.max(0) as u64,
                dead.max(0) as u64,
                bytes.max(0) as u64,
            ))
        })
    }

    fn column_exists<'a>(&'a self, table: &'a str, column: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let (schema, name) = match table.rsplit_once('.') {
                Some((schema, name)) => (Some(schema.to_string()), name.to_string()),
                None => (None, table.to_string()),
            };
            let exists: bool = sqlx::query_scalar(COLUMN_EXISTS_SQL)
                .bind(name)
                .bind(column.to_string())
                .bind(schema)
                .fetch_one(&self.pool)
                .await?;
            Ok(exists)
        })
    }
}

enum Conn {
    Tx(Transaction<'static, Postgres>),
    Plain(PoolConnection<Postgres>),
}

/// A PostgreSQL session
pub struct PgSession {
    conn: Conn,
    slow_statement: Duration,
}

impl PgSession {
    fn connection(&mut self) -> &mut PgConnection {
        match &mut self.conn {
            Conn::Tx(tx) => &mut **tx,
            Conn::Plain(conn) => &mut **conn,
        }
    }

    fn log_if_slow(&self, start: Instant, sql: &str) {
        let elapsed = start.elapsed();
        if elapsed > self.slow_statement {
            tracing::warn!(
                target: "pagewise::slow_query",
                elapsed_ms = elapsed.as_millis() as u64,
                sql = %sql,
                "slow statement"
            );
        }
    }
}

impl Session for PgSession {
    fn count<'a>(&'a mut self, table: &'a str, predicate: &'a Predicate) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut builder = count_statement(table, predicate);
            let sql = builder.sql().to_string();
            let start = Instant::now();
            let count = builder
                .build_query_scalar::<i64>()
                .fetch_one(self.connection())
                .await?;
            self.log_if_slow(start, &sql);
            Ok(count.max(0) as u64)
        })
    }

    fn count_raw<'a>(&'a mut self, query: &'a RawQuery) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let start = Instant::now();
            let result = match &mut self.conn {
                Conn::Tx(tx) => {
                    let mut savepoint = Connection::begin(&mut **tx).await?;
                    let result = bind_params(sqlx::query_scalar(&query.sql), &query.params)
                        .fetch_one(&mut *savepoint)
                        .await;
                    match result {
                        Ok(count) => {
                            savepoint.commit().await?;
                            Ok(count)
                        }
                        Err(err) => {
                            savepoint.rollback().await?;
                            Err(err)
                        }
                    }
                }
                Conn::Plain(conn) => {
                    bind_params(sqlx::query_scalar(&query.sql), &query.params)
                        .fetch_one(&mut **conn)
                        .await
                }
            };
            self.log_if_slow(start, &query.sql);
            Ok(result?.max(0) as u64)
        })
    }

    fn fetch<'a>(&'a mut self, query: &'a FetchQuery) -> StoreFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let mut builder = fetch_statement(query);
            let sql = builder.sql().to_string();
            let start = Instant::now();
            let rows = builder
                .build_query_scalar::<Value>()
                .fetch_all(self.connection())
                .await?;
            self.log_if_slow(start, &sql);
            Ok(rows)
        })
    }

    fn finish(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            match self.conn {
                Conn::Tx(tx) => tx.commit().await?,
                Conn::Plain(conn) => drop(conn),
            }
            Ok(())
        })
    }
}

/// Bind positional parameters in placeholder order
fn bind_params<'q>(
    mut query: QueryScalar<'q, Postgres, i64, PgArguments>,
    params: &'q [SqlParam],
) -> QueryScalar<'q, Postgres, i64, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Null => query.bind(None::<String>),
            SqlParam::Bool(b) => query.bind(*b),
            SqlParam::Int(i) => query.bind(*i),
            SqlParam::Float(f) => query.bind(*f),
            SqlParam::Text(s) => query.bind(s.as_str()),
            SqlParam::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}
