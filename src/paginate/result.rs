//! Page envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::count::CountOutcome;

/// One page of results with completeness metadata.
///
/// `total_count` and `page_count` are `None` exactly when the total is
/// unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub current_page: u32,
    pub per_page: u32,
    pub results: Vec<T>,
    pub total_count: Option<u64>,
    pub page_count: Option<u64>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub is_total_unknown: bool,
    pub is_total_estimated: bool,
}

impl<T> PageResult<T> {
    /// Page whose total was counted or estimated
    pub fn counted(page: u32, per_page: u32, results: Vec<T>, count: CountOutcome) -> Self {
        match count.total {
            Some(total) => {
                let page_count = page_count(total, per_page);
                Self {
                    current_page: page,
                    per_page,
                    results,
                    total_count: Some(total),
                    page_count: Some(page_count),
                    has_next_page: u64::from(page) < page_count,
                    has_previous_page: page > 1,
                    is_total_unknown: false,
                    is_total_estimated: count.estimated,
                }
            }
            None => Self::unknown_total(page, per_page, results, false),
        }
    }

    /// Page fetched with one extra row instead of a count
    pub fn unknown_total(page: u32, per_page: u32, results: Vec<T>, has_next_page: bool) -> Self {
        Self {
            current_page: page,
            per_page,
            results,
            total_count: None,
            page_count: None,
            has_next_page,
            has_previous_page: page > 1,
            is_total_unknown: true,
            is_total_estimated: false,
        }
    }

    pub fn map<U, F>(self, f: F) -> PageResult<U>
    where
        F: FnMut(T) -> U,
    {
        PageResult {
            current_page: self.current_page,
            per_page: self.per_page,
            results: self.results.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_count: self.page_count,
            has_next_page: self.has_next_page,
            has_previous_page: self.has_previous_page,
            is_total_unknown: self.is_total_unknown,
            is_total_estimated: self.is_total_estimated,
        }
    }
}

/// `max(1, ceil(total / per_page))`
pub fn page_count(total: u64, per_page: u32) -> u64 {
    let per_page = u64::from(per_page.max(1));
    total.div_ceil(per_page).max(1)
}

impl<T: Serialize> IntoResponse for PageResult<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(5, 2), 3);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
    }

    #[test]
    fn test_counted_envelope() {
        let page = PageResult::counted(1, 2, vec![1, 2], CountOutcome::exact(5));
        assert_eq!(page.total_count, Some(5));
        assert_eq!(page.page_count, Some(3));
        assert!(page.has_next_page);
        assert!(!page.has_previous_page);
        assert!(!page.is_total_unknown);

        let last = PageResult::counted(3, 2, vec![5], CountOutcome::estimated(5));
        assert!(!last.has_next_page);
        assert!(last.has_previous_page);
        assert!(last.is_total_estimated);
    }

    #[test]
    fn test_unknown_total_serializes_nulls() {
        let page = PageResult::unknown_total(2, 10, vec![json!({"id": 1})], true);
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["totalCount"], json!(null));
        assert_eq!(value["pageCount"], json!(null));
        assert_eq!(value["isTotalUnknown"], json!(true));
        assert_eq!(value["hasNextPage"], json!(true));
        assert_eq!(value["hasPreviousPage"], json!(true));
        assert_eq!(value["currentPage"], json!(2));
    }
}
