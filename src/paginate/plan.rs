//! Resolved query plan
//!
//! Everything decided before the store is touched for rows. `explain`
//! returns it as-is.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::count::CountPlan;
use crate::filter::FilterCondition;
use crate::predicate::{OrderKey, Predicate};
use crate::registry::CollectionHandle;
use crate::search::SearchPlan;
use crate::sql::{RawPredicateCompiler, RawQuery};
use crate::store::FetchQuery;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    #[serde(serialize_with = "collection_name")]
    pub collection: Arc<CollectionHandle>,
    pub page: u32,
    pub per_page: u32,
    pub skip: u64,
    /// Fetch one extra row and skip counting
    pub fast_path: bool,
    pub filters: Vec<FilterCondition>,
    pub search: SearchPlan,
    pub predicate: Predicate,
    pub order: Vec<OrderKey>,
    pub count: CountPlan,
}

fn collection_name<S: Serializer>(collection: &Arc<CollectionHandle>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&collection.name)
}

impl QueryPlan {
    /// Rows requested from the store
    pub fn take(&self) -> u64 {
        let per_page = u64::from(self.per_page);
        if self.fast_path {
            per_page + 1
        } else {
            per_page
        }
    }

    pub fn fetch_query(&self) -> FetchQuery {
        FetchQuery {
            table: self.collection.table.clone(),
            predicate: self.predicate.clone(),
            order: self.order.clone(),
            skip: self.skip,
            take: self.take(),
        }
    }

    /// Exact count statement for the combined predicate
    pub fn count_sql(&self) -> RawQuery {
        RawPredicateCompiler::count_query(&self.collection.table, &self.predicate)
    }
}
