//! # Pagination Orchestrator
//!
//! Resolves a descriptor into a plan, runs count and fetch against the
//! store, hydrates the rows and assembles the envelope.
//!
//! ## Execution
//! - Transactional (default): count then fetch in one READ COMMITTED session
//! - Parallel: count and fetch concurrently on two autocommit sessions
//!
//! In both modes session acquisition is bounded by `tx_max_wait` and the
//! body by `tx_timeout`. Hydration runs after the round-trip.

use std::sync::Arc;

use futures_util::future::try_join;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;

use super::descriptor::QueryDescriptor;
use super::errors::{PaginateError, PaginateResult};
use super::ordering::resolve_ordering;
use super::plan::QueryPlan;
use super::result::PageResult;
use crate::config::EngineConfig;
use crate::count::{CountExecutor, CountOutcome, CountPlan, CountRequest, CountStrategySelector};
use crate::filter::{to_predicate, FilterConditionBuilder};
use crate::hydrate::{Hydrator, NoopHydrator};
use crate::observability::{Event, Phase, PhaseTimings, Timer};
use crate::predicate::Predicate;
use crate::registry::CollectionRegistry;
use crate::schema::FieldTypeCatalog;
use crate::search::SearchStrategySelector;
use crate::store::{Session, SessionMode, Store, StoreError};
use crate::visibility::{Principal, Unrestricted, VisibilityProvider};

/// How count and fetch are run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Transactional,
    Parallel,
}

/// The pagination engine.
///
/// Owns the process-wide caches (field types, search support), so one
/// instance should be shared for the life of the process.
pub struct Paginator {
    store: Arc<dyn Store>,
    registry: Arc<CollectionRegistry>,
    visibility: Arc<dyn VisibilityProvider>,
    hydrator: Arc<dyn Hydrator>,
    config: EngineConfig,
    mode: ExecutionMode,
    catalog: FieldTypeCatalog,
    search: SearchStrategySelector,
    counts: CountStrategySelector,
}

impl Paginator {
    pub fn new(store: Arc<dyn Store>, registry: Arc<CollectionRegistry>, config: EngineConfig) -> Self {
        let counts = CountStrategySelector::new(config.count.clone());
        Self {
            store,
            registry,
            visibility: Arc::new(Unrestricted),
            hydrator: Arc::new(NoopHydrator),
            config,
            mode: ExecutionMode::default(),
            catalog: FieldTypeCatalog::new(),
            search: SearchStrategySelector::new(),
            counts,
        }
    }

    pub fn with_visibility(mut self, visibility: Arc<dyn VisibilityProvider>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_hydrator(mut self, hydrator: Arc<dyn Hydrator>) -> Self {
        self.hydrator = hydrator;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Fetch one page of `collection`
    pub async fn paginate(
        &self,
        descriptor: &QueryDescriptor,
        collection: &str,
        principal: &Principal,
    ) -> PaginateResult<PageResult<Value>> {
        let mut timings = PhaseTimings::new();

        let timer = Timer::new();
        let plan = self.plan(descriptor, collection, principal).await?;
        timer.stop(&mut timings, Phase::Resolve);

        let executed = match self.mode {
            ExecutionMode::Transactional => self.run_transactional(&plan, &mut timings).await,
            ExecutionMode::Parallel => self.run_parallel(&plan, &mut timings).await,
        };
        let (count, mut rows) = match executed {
            Ok(out) => out,
            Err(err) => {
                tracing::error!(
                    target: "pagewise::paginate",
                    event = Event::PaginationFailed.as_str(),
                    collection,
                    keys = ?descriptor.filter_keys(),
                    page = plan.page,
                    per_page = plan.per_page,
                    error = %err,
                    "pagination failed"
                );
                return Err(err);
            }
        };

        let has_extra = plan.fast_path && rows.len() as u64 > u64::from(plan.per_page);
        rows.truncate(plan.per_page as usize);

        let timer = Timer::new();
        let rows = self.hydrate(collection, rows).await;
        timer.stop(&mut timings, Phase::Hydrate);

        timings.report(collection, self.config.slow_query_threshold());

        Ok(if plan.fast_path {
            PageResult::unknown_total(plan.page, plan.per_page, rows, has_extra)
        } else {
            PageResult::counted(plan.page, plan.per_page, rows, count)
        })
    }

    /// Resolve a descriptor without reading rows
    pub async fn plan(
        &self,
        descriptor: &QueryDescriptor,
        collection: &str,
        principal: &Principal,
    ) -> PaginateResult<QueryPlan> {
        let handle = self
            .registry
            .get(collection)
            .ok_or_else(|| PaginateError::UnknownCollection(collection.to_string()))?;

        let page = descriptor.page;
        let per_page = descriptor.per_page.unwrap_or(self.config.default_per_page);
        if page < 1 {
            return Err(PaginateError::bad_request("page must be at least 1"));
        }
        if per_page < 1 || per_page > self.config.max_per_page {
            return Err(PaginateError::bad_request(format!(
                "perPage must be within 1..={}",
                self.config.max_per_page
            )));
        }

        let types = self.catalog.types_for(&handle.name, &handle.schema);
        let filters =
            FilterConditionBuilder::new(&handle.name, &types).build(&descriptor.filters, &handle.filterable_fields);

        let search = self
            .search
            .plan(descriptor.search.as_deref(), &handle, self.store.as_ref())
            .await;

        let soft_delete = match &handle.soft_delete_column {
            Some(column) => Predicate::is_null(column.as_str()),
            None => Predicate::always(),
        };
        let predicate = Predicate::and_all([
            self.visibility.predicate(&handle, principal),
            soft_delete,
            to_predicate(&filters),
            search.predicate(),
        ]);

        let order = resolve_ordering(descriptor.ordering.as_deref(), &handle, &search);
        // Tied to an active search plan: a term on a collection without
        // searchable fields plans `NoSearch` and is counted as usual
        let fast_path = search.is_search();

        let count = self
            .counts
            .select(
                CountRequest {
                    collection: &handle.name,
                    table: &handle.table,
                    predicate: &predicate,
                    page,
                    mode: descriptor.count_mode.unwrap_or(handle.count_mode),
                    fast_path,
                },
                self.store.as_ref(),
            )
            .await;

        Ok(QueryPlan {
            skip: u64::from(page - 1) * u64::from(per_page),
            collection: handle,
            page,
            per_page,
            fast_path,
            filters,
            search,
            predicate,
            order,
            count,
        })
    }

    async fn run_transactional(
        &self,
        plan: &QueryPlan,
        timings: &mut PhaseTimings,
    ) -> PaginateResult<(CountOutcome, Vec<Value>)> {
        let name = plan.collection.name.as_str();
        let mut session = self.acquire(name, SessionMode::ReadCommitted).await?;

        let body = async move {
            let timer = Timer::new();
            let count = self.executor(plan).run(&plan.count, session.as_mut()).await?;
            timer.stop(timings, Phase::Count);

            let timer = Timer::new();
            let rows = session.fetch(&plan.fetch_query()).await?;
            session.finish().await?;
            timer.stop(timings, Phase::Fetch);
            Ok::<_, StoreError>((count, rows))
        };

        match timeout(self.config.tx_timeout(), body).await {
            Ok(result) => result.map_err(|e| PaginateError::internal(name, e)),
            Err(_) => Err(PaginateError::Timeout {
                collection: name.to_string(),
                stage: "transaction",
            }),
        }
    }

    async fn run_parallel(
        &self,
        plan: &QueryPlan,
        timings: &mut PhaseTimings,
    ) -> PaginateResult<(CountOutcome, Vec<Value>)> {
        let name = plan.collection.name.as_str();

        let count = async {
            let timer = Timer::new();
            if matches!(plan.count, CountPlan::Skip) {
                return Ok((CountOutcome::skipped(), timer));
            }
            let mut session = self.acquire(name, SessionMode::Autocommit).await?;
            let count = self
                .executor(plan)
                .run(&plan.count, session.as_mut())
                .await
                .map_err(|e| PaginateError::internal(name, e))?;
            session.finish().await.map_err(|e| PaginateError::internal(name, e))?;
            Ok::<_, PaginateError>((count, timer))
        };

        let fetch = async {
            let timer = Timer::new();
            let mut session = self.acquire(name, SessionMode::Autocommit).await?;
            let rows = session
                .fetch(&plan.fetch_query())
                .await
                .map_err(|e| PaginateError::internal(name, e))?;
            session.finish().await.map_err(|e| PaginateError::internal(name, e))?;
            Ok::<_, PaginateError>((rows, timer))
        };

        match timeout(self.config.tx_timeout(), try_join(count, fetch)).await {
            Ok(Ok(((count, count_timer), (rows, fetch_timer)))) => {
                count_timer.stop(timings, Phase::Count);
                fetch_timer.stop(timings, Phase::Fetch);
                Ok((count, rows))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(PaginateError::Timeout {
                collection: name.to_string(),
                stage: "parallel execution",
            }),
        }
    }

    async fn acquire(&self, collection: &str, mode: SessionMode) -> PaginateResult<Box<dyn Session>> {
        match timeout(self.config.tx_max_wait(), self.store.open_session(mode)).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(err)) => Err(PaginateError::internal(collection, err)),
            Err(_) => Err(PaginateError::Timeout {
                collection: collection.to_string(),
                stage: "session acquisition",
            }),
        }
    }

    fn executor<'a>(&'a self, plan: &'a QueryPlan) -> CountExecutor<'a> {
        CountExecutor::new(
            &plan.collection.name,
            &plan.collection.table,
            &plan.predicate,
            self.counts.thresholds(),
        )
    }

    async fn hydrate(&self, collection: &str, rows: Vec<Value>) -> Vec<Value> {
        if rows.is_empty() {
            return rows;
        }
        match self.hydrator.hydrate(collection, rows.clone()).await {
            Ok(hydrated) if hydrated.len() == rows.len() => hydrated,
            Ok(hydrated) => {
                tracing::warn!(
                    target: "pagewise::hydrate",
                    event = Event::HydrationFailed.as_str(),
                    collection,
                    expected = rows.len(),
                    returned = hydrated.len(),
                    "hydrator changed the row count; keeping rows as fetched"
                );
                rows
            }
            Err(err) => {
                tracing::warn!(
                    target: "pagewise::hydrate",
                    event = Event::HydrationFailed.as_str(),
                    collection,
                    error = %err,
                    "hydration failed; keeping rows as fetched"
                );
                rows
            }
        }
    }
}
