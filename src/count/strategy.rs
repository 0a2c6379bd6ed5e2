//! # Count Strategy Selector
//!
//! Picks how the total of a page request is obtained. The first matching
//! rule wins:
//!
//! 1. fast search path: skip counting
//! 2. `exact`: exact count
//! 3. `estimate`: the estimator
//! 4. `smart`: exact for small tables and shallow pages, the estimator for
//!    deep pages into large tables, exact otherwise
//!
//! The estimator counts exactly on small tables, samples when the predicate
//! has branches and otherwise reports the live row count.
//!
//! Statistics are read outside any transaction. Failing to read them means
//! an exact count.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::stats::{CountThresholds, TableStatsSnapshot};
use crate::observability::Event;
use crate::predicate::Predicate;
use crate::sql::{RawPredicateCompiler, RawQuery};
use crate::store::Store;

/// Requested counting mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    Exact,
    Estimate,
    #[default]
    Smart,
}

impl CountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountMode::Exact => "exact",
            CountMode::Estimate => "estimate",
            CountMode::Smart => "smart",
        }
    }
}

impl FromStr for CountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(CountMode::Exact),
            "estimate" => Ok(CountMode::Estimate),
            "smart" => Ok(CountMode::Smart),
            other => Err(format!("unknown count mode '{}'", other)),
        }
    }
}

impl fmt::Display for CountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the total will be obtained
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum CountPlan {
    /// No count; the page tells whether a next page exists
    Skip,
    /// Exact count, through the raw statement when the predicate is simple
    Exact {
        #[serde(skip_serializing_if = "Option::is_none")]
        raw: Option<RawQuery>,
    },
    /// Bounded sample of matching rows
    #[serde(rename_all = "camelCase")]
    Sample {
        query: RawQuery,
        sample_size: u64,
        saturated_estimate: u64,
    },
    /// Planner statistics, used as-is
    #[serde(rename_all = "camelCase")]
    Statistics { live_rows: u64 },
}

impl CountPlan {
    pub fn name(&self) -> &'static str {
        match self {
            CountPlan::Skip => "skip",
            CountPlan::Exact { .. } => "exact",
            CountPlan::Sample { .. } => "sample",
            CountPlan::Statistics { .. } => "statistics",
        }
    }
}

/// Inputs of one count decision
#[derive(Debug, Clone, Copy)]
pub struct CountRequest<'a> {
    pub collection: &'a str,
    pub table: &'a str,
    pub predicate: &'a Predicate,
    pub page: u32,
    pub mode: CountMode,
    pub fast_path: bool,
}

/// Chooses a `CountPlan` per request
#[derive(Debug, Clone, Default)]
pub struct CountStrategySelector {
    thresholds: CountThresholds,
}

impl CountStrategySelector {
    pub fn new(thresholds: CountThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &CountThresholds {
        &self.thresholds
    }

    /// Decide the count plan. Never fails.
    pub async fn select(&self, request: CountRequest<'_>, store: &dyn Store) -> CountPlan {
        if request.fast_path {
            return CountPlan::Skip;
        }

        match request.mode {
            CountMode::Exact => self.exact(request.table, request.predicate),
            CountMode::Estimate => match self.stats(&request, store).await {
                Some(stats) => self.estimator(&request, &stats),
                None => self.exact(request.table, request.predicate),
            },
            CountMode::Smart => {
                let Some(stats) = self.stats(&request, store).await else {
                    return self.exact(request.table, request.predicate);
                };
                let t = &self.thresholds;
                if t.is_small(&stats) || request.page <= t.exact_page_depth {
                    self.exact(request.table, request.predicate)
                } else if t.is_large(&stats) {
                    self.estimator(&request, &stats)
                } else {
                    self.exact(request.table, request.predicate)
                }
            }
        }
    }

    /// Exact plan: the raw statement is used only for simple predicates
    pub fn exact(&self, table: &str, predicate: &Predicate) -> CountPlan {
        let raw = predicate
            .is_simple(self.thresholds.max_simple_branches)
            .then(|| RawPredicateCompiler::count_query(table, predicate));
        CountPlan::Exact { raw }
    }

    fn estimator(&self, request: &CountRequest<'_>, stats: &TableStatsSnapshot) -> CountPlan {
        let t = &self.thresholds;
        if t.is_small(stats) {
            tracing::debug!(
                target: "pagewise::count",
                event = Event::EstimatorSkipped.as_str(),
                collection = request.collection,
                live_rows = stats.live_rows,
                "table below estimation threshold; counting exactly"
            );
            return self.exact(request.table, request.predicate);
        }

        if request.predicate.has_branches() {
            let sample_size = t.sample_size(stats.live_rows);
            CountPlan::Sample {
                query: RawPredicateCompiler::sample_count_query(request.table, request.predicate, sample_size),
                sample_size,
                saturated_estimate: t.saturated_estimate(stats.live_rows),
            }
        } else {
            CountPlan::Statistics {
                live_rows: stats.live_rows,
            }
        }
    }

    async fn stats(&self, request: &CountRequest<'_>, store: &dyn Store) -> Option<TableStatsSnapshot> {
        match store.table_stats(request.table).await {
            Ok(stats) => Some(stats),
            Err(err) => {
                tracing::warn!(
                    target: "pagewise::count",
                    event = Event::EstimatorSkipped.as_str(),
                    collection = request.collection,
                    error = %err,
                    "table statistics unavailable; counting exactly"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::SqlValue;
    use crate::store::{FaultPoint, MemoryStore};

    fn request<'a>(predicate: &'a Predicate, page: u32, mode: CountMode) -> CountRequest<'a> {
        CountRequest {
            collection: "bugs",
            table: "bugs",
            predicate,
            page,
            mode,
            fast_path: false,
        }
    }

    fn store_with(live_rows: u64, bytes: u64) -> MemoryStore {
        let store = MemoryStore::new().with_table("bugs", Vec::new());
        store.set_stats("bugs", TableStatsSnapshot::new(live_rows, 0, bytes));
        store
    }

    fn branched() -> Predicate {
        Predicate::and_all([
            Predicate::is_null("deleted_at"),
            Predicate::eq("status", SqlValue::text("open")),
        ])
    }

    #[tokio::test]
    async fn test_fast_path_skips() {
        let selector = CountStrategySelector::default();
        let pred = branched();
        let mut req = request(&pred, 1, CountMode::Exact);
        req.fast_path = true;
        assert_eq!(selector.select(req, &MemoryStore::new()).await, CountPlan::Skip);
    }

    #[tokio::test]
    async fn test_smart_deep_page_into_large_table_samples() {
        let selector = CountStrategySelector::default();
        let store = store_with(200_000, 0);
        let pred = branched();

        let plan = selector.select(request(&pred, 10, CountMode::Smart), &store).await;
        match plan {
            CountPlan::Sample {
                sample_size,
                saturated_estimate,
                ..
            } => {
                assert_eq!(sample_size, 1000);
                assert_eq!(saturated_estimate, 160_000);
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_smart_shallow_or_small_is_exact() {
        let selector = CountStrategySelector::default();
        let pred = branched();

        let plan = selector.select(request(&pred, 5, CountMode::Smart), &store_with(200_000, 0)).await;
        assert_eq!(plan.name(), "exact");

        let plan = selector.select(request(&pred, 50, CountMode::Smart), &store_with(9_999, 0)).await;
        assert_eq!(plan.name(), "exact");

        // Medium table: neither small nor large
        let plan = selector.select(request(&pred, 50, CountMode::Smart), &store_with(50_000, 1024)).await;
        assert_eq!(plan.name(), "exact");
    }

    #[tokio::test]
    async fn test_estimate_without_branches_uses_statistics() {
        let selector = CountStrategySelector::default();
        let pred = Predicate::eq("status", SqlValue::text("open"));
        let plan = selector.select(request(&pred, 1, CountMode::Estimate), &store_with(50_000, 0)).await;
        assert_eq!(plan, CountPlan::Statistics { live_rows: 50_000 });
    }

    #[tokio::test]
    async fn test_stats_failure_means_exact() {
        let selector = CountStrategySelector::default();
        let store = store_with(200_000, 0);
        store.fail_at(FaultPoint::TableStats);
        let pred = branched();
        let plan = selector.select(request(&pred, 10, CountMode::Smart), &store).await;
        assert_eq!(plan.name(), "exact");
    }

    #[test]
    fn test_exact_uses_raw_only_for_simple_predicates() {
        let selector = CountStrategySelector::default();
        assert!(matches!(
            selector.exact("bugs", &branched()),
            CountPlan::Exact { raw: Some(_) }
        ));

        let complex = Predicate::and_all([
            branched(),
            Predicate::or_any([
                Predicate::eq("a", SqlValue::Int(1)),
                Predicate::eq("b", SqlValue::Int(2)),
            ]),
        ]);
        assert_eq!(selector.exact("bugs", &complex), CountPlan::Exact { raw: None });
    }

    #[test]
    fn test_count_mode_parse() {
        assert_eq!("EXACT".parse::<CountMode>().unwrap(), CountMode::Exact);
        assert!("fast".parse::<CountMode>().is_err());
        assert_eq!(CountMode::default(), CountMode::Smart);
    }
}
