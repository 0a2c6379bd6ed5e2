//! Ordering resolution
//!
//! The requested ordering is honoured only for allow-listed fields; anything
//! else falls back to the collection default. Search relevance leads when no
//! ordering was requested. The primary key always closes the list so that
//! pages never overlap.

use crate::predicate::{OrderKey, SortDirection};
use crate::registry::CollectionHandle;
use crate::search::SearchPlan;

/// Parse `field` / `-field` into a field and a direction
pub fn parse_ordering(ordering: &str) -> Option<(&str, SortDirection)> {
    let ordering = ordering.trim();
    let (field, direction) = match ordering.strip_prefix('-') {
        Some(field) => (field, SortDirection::Desc),
        None => (ordering, SortDirection::Asc),
    };
    (!field.is_empty()).then_some((field, direction))
}

/// Full ordering of a request, primary key last
pub fn resolve_ordering(requested: Option<&str>, collection: &CollectionHandle, search: &SearchPlan) -> Vec<OrderKey> {
    let explicit = requested
        .and_then(parse_ordering)
        .filter(|(field, _)| collection.orderable_fields.iter().any(|f| f == field));

    let mut keys = Vec::with_capacity(3);
    let (field, direction) = match explicit {
        Some(primary) => primary,
        None => {
            if let Some(rank) = search.rank_key() {
                keys.push(rank);
            }
            parse_ordering(&collection.default_ordering).unwrap_or((collection.primary_key.as_str(), SortDirection::Desc))
        }
    };

    keys.push(OrderKey::Field {
        field: field.to_string(),
        direction,
    });
    if field != collection.primary_key {
        keys.push(OrderKey::Field {
            field: collection.primary_key.clone(),
            direction,
        });
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CollectionSchema;

    fn bugs() -> CollectionHandle {
        CollectionHandle::new("bugs", "bugs", CollectionSchema::new())
            .orderable(["title", "points", "id"])
            .searchable(["title"])
    }

    #[test]
    fn test_allow_listed_ordering_with_tie_break() {
        let keys = resolve_ordering(Some("-points"), &bugs(), &SearchPlan::NoSearch);
        assert_eq!(keys, vec![OrderKey::desc("points"), OrderKey::desc("id")]);

        let keys = resolve_ordering(Some("title"), &bugs(), &SearchPlan::NoSearch);
        assert_eq!(keys, vec![OrderKey::asc("title"), OrderKey::asc("id")]);
    }

    #[test]
    fn test_primary_key_ordering_has_no_tie_break() {
        let keys = resolve_ordering(Some("id"), &bugs(), &SearchPlan::NoSearch);
        assert_eq!(keys, vec![OrderKey::asc("id")]);
    }

    #[test]
    fn test_unknown_field_falls_back_to_default() {
        let keys = resolve_ordering(Some("-secret"), &bugs(), &SearchPlan::NoSearch);
        assert_eq!(keys, vec![OrderKey::desc("created_at"), OrderKey::desc("id")]);
        assert_eq!(resolve_ordering(None, &bugs(), &SearchPlan::NoSearch), keys);
    }

    #[test]
    fn test_search_rank_leads_without_explicit_ordering() {
        let search = SearchPlan::substring("crash", &["title".to_string()]);
        let keys = resolve_ordering(None, &bugs(), &search);
        assert!(matches!(keys[0], OrderKey::SubstringRank { .. }));
        assert_eq!(keys[1..], [OrderKey::desc("created_at"), OrderKey::desc("id")]);

        // Explicit ordering wins over relevance
        let keys = resolve_ordering(Some("title"), &bugs(), &search);
        assert_eq!(keys, vec![OrderKey::asc("title"), OrderKey::asc("id")]);
    }

    #[test]
    fn test_parse_ordering() {
        assert_eq!(parse_ordering("-a"), Some(("a", SortDirection::Desc)));
        assert_eq!(parse_ordering(" b "), Some(("b", SortDirection::Asc)));
        assert_eq!(parse_ordering("-"), None);
    }
}
