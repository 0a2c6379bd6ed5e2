//! # Search Strategy Selector
//!
//! Decides per request between the indexed full-text path and the substring
//! fallback. Whether a collection has its search column is probed once and
//! cached for the life of the process.

use std::collections::HashMap;
use std::sync::RwLock;

use super::plan::{split_terms, SearchPlan};
use crate::observability::Event;
use crate::registry::CollectionHandle;
use crate::store::Store;

/// Selects the search plan of a request
#[derive(Debug, Default)]
pub struct SearchStrategySelector {
    support: RwLock<HashMap<String, bool>>,
}

impl SearchStrategySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan the search for `collection`.
    ///
    /// Never fails; a failed probe means "not indexed" and is not cached.
    pub async fn plan(&self, search: Option<&str>, collection: &CollectionHandle, store: &dyn Store) -> SearchPlan {
        let search = match search.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return SearchPlan::NoSearch,
        };
        if collection.searchable_fields.is_empty() || split_terms(search).is_empty() {
            return SearchPlan::NoSearch;
        }

        if self.is_indexed(collection, store).await {
            SearchPlan::indexed(collection.search_column.as_str(), search)
        } else {
            SearchPlan::substring(search, &collection.searchable_fields)
        }
    }

    /// Cached answer, if the collection was probed already
    pub fn cached(&self, collection: &str) -> Option<bool> {
        self.support
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(collection)
            .copied()
    }

    async fn is_indexed(&self, collection: &CollectionHandle, store: &dyn Store) -> bool {
        if let Some(indexed) = self.cached(&collection.name) {
            return indexed;
        }

        match store
            .column_exists(&collection.table, &collection.search_column)
            .await
        {
            Ok(indexed) => {
                if !indexed {
                    tracing::info!(
                        target: "pagewise::search",
                        event = Event::SearchIndexAbsent.as_str(),
                        collection = %collection.name,
                        column = %collection.search_column,
                        "no search column; using substring search"
                    );
                }
                let mut support = self.support.write().unwrap_or_else(|e| e.into_inner());
                *support.entry(collection.name.clone()).or_insert(indexed)
            }
            Err(err) => {
                tracing::warn!(
                    target: "pagewise::search",
                    event = Event::SearchIndexProbeFailed.as_str(),
                    collection = %collection.name,
                    error = %err,
                    "search column probe failed; using substring search"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CollectionHandle;
    use crate::schema::CollectionSchema;
    use crate::store::{FaultPoint, MemoryStore};
    use serde_json::json;

    fn handle() -> CollectionHandle {
        CollectionHandle::new("bugs", "bugs", CollectionSchema::new()).searchable(["title"])
    }

    #[tokio::test]
    async fn test_substring_when_column_absent() {
        let store = MemoryStore::new().with_table("bugs", vec![json!({"title": "x"})]);
        let selector = SearchStrategySelector::new();

        let plan = selector.plan(Some(" crash "), &handle(), &store).await;
        assert!(matches!(plan, SearchPlan::SubstringSearch { .. }));
        assert_eq!(selector.cached("bugs"), Some(false));
    }

    #[tokio::test]
    async fn test_indexed_when_column_present_and_cached() {
        let store = MemoryStore::new().with_table("bugs", vec![json!({"title": "x", "search_vector": "x"})]);
        let selector = SearchStrategySelector::new();

        let plan = selector.plan(Some("crash"), &handle(), &store).await;
        assert_eq!(plan, SearchPlan::indexed("search_vector", "crash"));

        selector.plan(Some("again"), &handle(), &store).await;
        assert_eq!(store.hits(FaultPoint::ColumnProbe), 1);
    }

    #[tokio::test]
    async fn test_probe_failure_is_not_cached() {
        let store = MemoryStore::new().with_table("bugs", vec![json!({"search_vector": "x"})]);
        store.fail_at(FaultPoint::ColumnProbe);
        let selector = SearchStrategySelector::new();

        let plan = selector.plan(Some("crash"), &handle(), &store).await;
        assert!(matches!(plan, SearchPlan::SubstringSearch { .. }));
        assert_eq!(selector.cached("bugs"), None);

        store.clear_faults();
        let plan = selector.plan(Some("crash"), &handle(), &store).await;
        assert!(matches!(plan, SearchPlan::IndexedSearch { .. }));
    }

    #[tokio::test]
    async fn test_blank_search_skips_probe() {
        let store = MemoryStore::new();
        let selector = SearchStrategySelector::new();
        assert_eq!(selector.plan(Some("   "), &handle(), &store).await, SearchPlan::NoSearch);
        assert_eq!(selector.plan(None, &handle(), &store).await, SearchPlan::NoSearch);
        assert_eq!(store.hits(FaultPoint::ColumnProbe), 0);
    }
}
