//! Query descriptors
//!
//! The request as the caller sent it, before any validation against the
//! collection. Reserved keys configure paging; every other key is a filter.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::errors::{PaginateError, PaginateResult};
use crate::count::CountMode;
use crate::filter::FilterValue;

const KEY_PAGE: &str = "page";
const KEYS_PER_PAGE: &[&str] = &["perPage", "pageSize", "page_size"];
const KEY_SEARCH: &str = "search";
const KEY_ORDERING: &str = "ordering";
const KEY_COUNT_MODE: &str = "countMode";

/// One page request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub page: u32,
    /// Absent means the configured default
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub count_mode: Option<CountMode>,
    pub filters: BTreeMap<String, FilterValue>,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: None,
            search: None,
            ordering: None,
            count_mode: None,
            filters: BTreeMap::new(),
        }
    }
}

impl QueryDescriptor {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page: Some(per_page),
            ..Self::default()
        }
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn ordering(mut self, ordering: impl Into<String>) -> Self {
        self.ordering = Some(ordering.into());
        self
    }

    pub fn count_mode(mut self, mode: CountMode) -> Self {
        self.count_mode = Some(mode);
        self
    }

    /// Add a filter; a repeated key accumulates
    pub fn filter(mut self, key: impl Into<String>, value: FilterValue) -> Self {
        self.add_filter(key.into(), value);
        self
    }

    /// Build from query-string pairs, in arrival order.
    ///
    /// Later values of a reserved key win. Repeated filter keys become lists.
    pub fn from_pairs<I, K, V>(pairs: I) -> PaginateResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut descriptor = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                KEY_PAGE => descriptor.page = parse_number(key, value)?,
                k if KEYS_PER_PAGE.contains(&k) => descriptor.per_page = Some(parse_number(key, value)?),
                KEY_SEARCH => descriptor.search = non_empty(value),
                KEY_ORDERING => descriptor.ordering = non_empty(value),
                KEY_COUNT_MODE => descriptor.count_mode = Some(parse_count_mode(value)?),
                _ => descriptor.add_filter(key.to_string(), FilterValue::parse(value)),
            }
        }
        Ok(descriptor)
    }

    /// Build from a JSON object. Numbers may arrive as strings.
    pub fn from_json(value: &Value) -> PaginateResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| PaginateError::bad_request("query parameters must be a JSON object"))?;

        let mut descriptor = Self::default();
        for (key, value) in object {
            let key = key.as_str();
            match key {
                KEY_PAGE => descriptor.page = json_number(key, value)?,
                k if KEYS_PER_PAGE.contains(&k) => descriptor.per_page = Some(json_number(key, value)?),
                KEY_SEARCH => descriptor.search = json_text(key, value)?.and_then(|s| non_empty(&s)),
                KEY_ORDERING => descriptor.ordering = json_text(key, value)?.and_then(|s| non_empty(&s)),
                KEY_COUNT_MODE => {
                    descriptor.count_mode = match json_text(key, value)? {
                        Some(mode) => Some(parse_count_mode(&mode)?),
                        None => None,
                    }
                }
                _ => {
                    let filter = match value {
                        Value::String(s) => FilterValue::parse(s),
                        other => FilterValue::from_json(other),
                    };
                    descriptor.add_filter(key.to_string(), filter);
                }
            }
        }
        Ok(descriptor)
    }

    /// Names of the filter keys, never their values
    pub fn filter_keys(&self) -> Vec<&str> {
        self.filters.keys().map(String::as_str).collect()
    }

    fn add_filter(&mut self, key: String, value: FilterValue) {
        let merged = match self.filters.remove(&key) {
            Some(existing) => existing.merge(value),
            None => value,
        };
        self.filters.insert(key, merged);
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_number(key: &str, value: &str) -> PaginateResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| PaginateError::bad_request(format!("'{}' must be a positive integer", key)))
}

fn parse_count_mode(value: &str) -> PaginateResult<CountMode> {
    value.trim().parse().map_err(PaginateError::BadRequest)
}

fn json_number(key: &str, value: &Value) -> PaginateResult<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| PaginateError::bad_request(format!("'{}' must be a positive integer", key))),
        Value::String(s) => parse_number(key, s),
        _ => Err(PaginateError::bad_request(format!("'{}' must be a positive integer", key))),
    }
}

fn json_text(key: &str, value: &Value) -> PaginateResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(PaginateError::bad_request(format!("'{}' must be a string", key))),
    }
}
