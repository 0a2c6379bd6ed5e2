//! Search plans

use serde::Serialize;

use crate::predicate::{CompareOp, OrderKey, Predicate, SqlValue};

/// How a free-text search is executed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SearchPlan {
    /// No search term, or nothing to search in
    NoSearch,
    /// Full-text match against an indexed search column
    IndexedSearch { column: String, query: String },
    /// Case-insensitive substring match across the searchable fields
    SubstringSearch {
        terms: Vec<String>,
        fields: Vec<String>,
        #[serde(skip)]
        predicate: Predicate,
    },
}

impl SearchPlan {
    /// Build a substring plan. Returns `NoSearch` when no term survives cleaning.
    pub fn substring(search: &str, fields: &[String]) -> Self {
        let terms = split_terms(search);
        if terms.is_empty() || fields.is_empty() {
            return SearchPlan::NoSearch;
        }
        let predicate = substring_predicate(&terms, fields);
        SearchPlan::SubstringSearch {
            terms,
            fields: fields.to_vec(),
            predicate,
        }
    }

    pub fn indexed(column: impl Into<String>, query: impl Into<String>) -> Self {
        SearchPlan::IndexedSearch {
            column: column.into(),
            query: query.into(),
        }
    }

    pub fn is_search(&self) -> bool {
        !matches!(self, SearchPlan::NoSearch)
    }

    /// The filtering predicate of the plan; `NoSearch` restricts nothing
    pub fn predicate(&self) -> Predicate {
        match self {
            SearchPlan::NoSearch => Predicate::always(),
            SearchPlan::IndexedSearch { column, query } => {
                Predicate::compare(column.as_str(), CompareOp::Matches, SqlValue::text(query.as_str()))
            }
            SearchPlan::SubstringSearch { predicate, .. } => predicate.clone(),
        }
    }

    /// Relevance ordering key, used when no explicit ordering was requested
    pub fn rank_key(&self) -> Option<OrderKey> {
        match self {
            SearchPlan::NoSearch => None,
            SearchPlan::IndexedSearch { column, query } => Some(OrderKey::TextRank {
                column: column.clone(),
                query: query.clone(),
            }),
            SearchPlan::SubstringSearch { terms, fields, .. } => Some(OrderKey::SubstringRank {
                fields: fields.clone(),
                terms: terms.clone(),
            }),
        }
    }
}

/// Split a search string into terms.
///
/// NUL characters are stripped and commas count as whitespace.
pub fn split_terms(search: &str) -> Vec<String> {
    search
        .replace('\0', "")
        .replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Every term must match some field; a field matches a term exactly, by
/// prefix or by substring, all case-insensitively.
fn substring_predicate(terms: &[String], fields: &[String]) -> Predicate {
    Predicate::and_all(terms.iter().map(|term| {
        Predicate::or_any(fields.iter().flat_map(|field| {
            [CompareOp::IEquals, CompareOp::StartsWith, CompareOp::Contains]
                .into_iter()
                .map(move |op| Predicate::compare(field.as_str(), op, SqlValue::text(term.as_str())))
        }))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::matches;
    use serde_json::json;

    fn fields() -> Vec<String> {
        vec!["title".to_string(), "code".to_string()]
    }

    #[test]
    fn test_split_terms() {
        assert_eq!(split_terms(" crash,save\0  now "), vec!["crash", "save", "now"]);
        assert!(split_terms(" , \0 ").is_empty());
    }

    #[test]
    fn test_substring_plan_requires_every_term() {
        let plan = SearchPlan::substring("save crash", &fields());
        let pred = plan.predicate();
        assert!(matches(&pred, &json!({"title": "Crash on SAVE", "code": "B-1"})));
        assert!(matches(&pred, &json!({"title": "save", "code": "crash-7"})));
        assert!(!matches(&pred, &json!({"title": "Save dialog", "code": "B-2"})));
    }

    #[test]
    fn test_blank_search_is_no_search() {
        assert_eq!(SearchPlan::substring(" ,, ", &fields()), SearchPlan::NoSearch);
        assert_eq!(SearchPlan::substring("x", &[]), SearchPlan::NoSearch);
        assert!(SearchPlan::NoSearch.predicate().is_always());
        assert!(SearchPlan::NoSearch.rank_key().is_none());
    }

    #[test]
    fn test_indexed_plan() {
        let plan = SearchPlan::indexed("search_vector", "acme corp");
        assert_eq!(
            plan.predicate(),
            Predicate::compare("search_vector", CompareOp::Matches, SqlValue::text("acme corp"))
        );
        assert!(matches!(plan.rank_key(), Some(OrderKey::TextRank { .. })));
    }
}
