//! Runs a `CountPlan` against a session.
//!
//! Fallback chain: sample, then exact raw, then declarative. Only a failing
//! declarative count is an error.

use serde::Serialize;

use super::stats::CountThresholds;
use super::strategy::CountPlan;
use crate::observability::Event;
use crate::predicate::Predicate;
use crate::sql::{RawPredicateCompiler, RawQuery};
use crate::store::{Session, StoreResult};

/// Result of a count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountOutcome {
    pub total: Option<u64>,
    pub estimated: bool,
}

impl CountOutcome {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn exact(total: u64) -> Self {
        Self {
            total: Some(total),
            estimated: false,
        }
    }

    pub fn estimated(total: u64) -> Self {
        Self {
            total: Some(total),
            estimated: true,
        }
    }
}

pub struct CountExecutor<'a> {
    collection: &'a str,
    table: &'a str,
    predicate: &'a Predicate,
    thresholds: &'a CountThresholds,
}

impl<'a> CountExecutor<'a> {
    pub fn new(
        collection: &'a str,
        table: &'a str,
        predicate: &'a Predicate,
        thresholds: &'a CountThresholds,
    ) -> Self {
        Self {
            collection,
            table,
            predicate,
            thresholds,
        }
    }

    pub async fn run(&self, plan: &CountPlan, session: &mut dyn Session) -> StoreResult<CountOutcome> {
        match plan {
            CountPlan::Skip => Ok(CountOutcome::skipped()),
            CountPlan::Statistics { live_rows } => Ok(CountOutcome::estimated(*live_rows)),
            CountPlan::Exact { raw } => self.exact(raw.as_ref(), session).await,
            CountPlan::Sample {
                query,
                sample_size,
                saturated_estimate,
            } => match session.count_raw(query).await {
                Ok(sampled) if sampled >= *sample_size => Ok(CountOutcome::estimated(*saturated_estimate)),
                Ok(sampled) => Ok(CountOutcome::estimated(sampled)),
                Err(err) => {
                    self.fallback("sample", "exact", &err);
                    let raw = self
                        .predicate
                        .is_simple(self.thresholds.max_simple_branches)
                        .then(|| RawPredicateCompiler::count_query(self.table, self.predicate));
                    self.exact(raw.as_ref(), session).await
                }
            },
        }
    }

    async fn exact(&self, raw: Option<&RawQuery>, session: &mut dyn Session) -> StoreResult<CountOutcome> {
        if let Some(raw) = raw {
            match session.count_raw(raw).await {
                Ok(total) => return Ok(CountOutcome::exact(total)),
                Err(err) => self.fallback("raw", "declarative", &err),
            }
        }
        let total = session.count(self.table, self.predicate).await?;
        Ok(CountOutcome::exact(total))
    }

    fn fallback(&self, from: &str, to: &str, err: &dyn std::fmt::Display) {
        tracing::warn!(
            target: "pagewise::count",
            event = Event::CountFallback.as_str(),
            collection = self.collection,
            from,
            to,
            error = %err,
            "count fallback"
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::predicate::SqlValue;
    use crate::store::{FaultPoint, MemoryStore, SessionMode, Store};

    fn rows(n: usize) -> Vec<serde_json::Value> {
        (0..n)
            .map(|i| json!({"id": i, "status": if i % 2 == 0 { "open" } else { "closed" }, "deleted_at": null}))
            .collect()
    }

    fn open_pred() -> Predicate {
        Predicate::and_all([
            Predicate::is_null("deleted_at"),
            Predicate::eq("status", SqlValue::text("open")),
        ])
    }

    #[tokio::test]
    async fn test_exact_raw_count() {
        let store = MemoryStore::new().with_table("bugs", rows(10));
        let pred = open_pred();
        let thresholds = CountThresholds::default();
        let exec = CountExecutor::new("bugs", "bugs", &pred, &thresholds);
        let plan = CountPlan::Exact {
            raw: Some(RawPredicateCompiler::count_query("bugs", &pred)),
        };

        let mut session = store.open_session(SessionMode::ReadCommitted).await.unwrap();
        let outcome = exec.run(&plan, session.as_mut()).await.unwrap();
        assert_eq!(outcome, CountOutcome::exact(5));
        assert_eq!(store.hits(FaultPoint::RawCount), 1);
        assert_eq!(store.hits(FaultPoint::Count), 0);
    }

    #[tokio::test]
    async fn test_raw_failure_falls_back_to_declarative() {
        let store = MemoryStore::new().with_table("bugs", rows(10));
        store.fail_at(FaultPoint::RawCount);
        let pred = open_pred();
        let thresholds = CountThresholds::default();
        let exec = CountExecutor::new("bugs", "bugs", &pred, &thresholds);
        let plan = CountPlan::Exact {
            raw: Some(RawPredicateCompiler::count_query("bugs", &pred)),
        };

        let mut session = store.open_session(SessionMode::ReadCommitted).await.unwrap();
        let outcome = exec.run(&plan, session.as_mut()).await.unwrap();
        assert_eq!(outcome, CountOutcome::exact(5));
        assert_eq!(store.hits(FaultPoint::Count), 1);
    }

    #[tokio::test]
    async fn test_sample_saturation_and_partial() {
        let store = MemoryStore::new().with_table("bugs", rows(10));
        let pred = open_pred();
        let thresholds = CountThresholds::default();
        let exec = CountExecutor::new("bugs", "bugs", &pred, &thresholds);
        let mut session = store.open_session(SessionMode::ReadCommitted).await.unwrap();

        let saturated = CountPlan::Sample {
            query: RawPredicateCompiler::sample_count_query("bugs", &pred, 3),
            sample_size: 3,
            saturated_estimate: 160_000,
        };
        assert_eq!(
            exec.run(&saturated, session.as_mut()).await.unwrap(),
            CountOutcome::estimated(160_000)
        );

        let partial = CountPlan::Sample {
            query: RawPredicateCompiler::sample_count_query("bugs", &pred, 8),
            sample_size: 8,
            saturated_estimate: 160_000,
        };
        assert_eq!(exec.run(&partial, session.as_mut()).await.unwrap(), CountOutcome::estimated(5));
    }

    #[tokio::test]
    async fn test_sample_failure_falls_back_to_exact() {
        let store = MemoryStore::new().with_table("bugs", rows(10));
        store.fail_at(FaultPoint::SampleCount);
        let pred = open_pred();
        let thresholds = CountThresholds::default();
        let exec = CountExecutor::new("bugs", "bugs", &pred, &thresholds);
        let plan = CountPlan::Sample {
            query: RawPredicateCompiler::sample_count_query("bugs", &pred, 3),
            sample_size: 3,
            saturated_estimate: 160_000,
        };

        let mut session = store.open_session(SessionMode::ReadCommitted).await.unwrap();
        let outcome = exec.run(&plan, session.as_mut()).await.unwrap();
        assert_eq!(outcome, CountOutcome::exact(5));
    }

    #[tokio::test]
    async fn test_declarative_failure_is_an_error() {
        let store = MemoryStore::new().with_table("bugs", rows(4));
        store.fail_at(FaultPoint::Count);
        let pred = open_pred();
        let thresholds = CountThresholds::default();
        let exec = CountExecutor::new("bugs", "bugs", &pred, &thresholds);

        let mut session = store.open_session(SessionMode::ReadCommitted).await.unwrap();
        let result = exec.run(&CountPlan::Exact { raw: None }, session.as_mut()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_skip_and_statistics() {
        let store = MemoryStore::new().with_table("bugs", rows(1));
        let pred = Predicate::always();
        let thresholds = CountThresholds::default();
        let exec = CountExecutor::new("bugs", "bugs", &pred, &thresholds);
        let mut session = store.open_session(SessionMode::Autocommit).await.unwrap();

        assert_eq!(exec.run(&CountPlan::Skip, session.as_mut()).await.unwrap(), CountOutcome::skipped());
        assert_eq!(
            exec.run(&CountPlan::Statistics { live_rows: 42 }, session.as_mut()).await.unwrap(),
            CountOutcome::estimated(42)
        );
    }
}
