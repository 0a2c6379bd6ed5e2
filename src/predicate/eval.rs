//! Row evaluation of predicate trees
//!
//! This is the reference declarative semantics, used by the in-memory store.
//! It follows SQL three-valued logic: a comparison against NULL is unknown
//! (`None`), and unknown rows are not selected.

use std::cmp::Ordering;

use serde_json::Value;

use super::tree::{CompareOp, Comparison, Predicate};
use super::value::SqlValue;

/// Evaluate a predicate against a row. `None` means unknown.
pub fn evaluate(pred: &Predicate, row: &Value) -> Option<bool> {
    match pred {
        Predicate::And(children) => {
            let mut unknown = false;
            for child in children {
                match evaluate(child, row) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown {
                None
            } else {
                Some(true)
            }
        }
        Predicate::Or(children) => {
            let mut unknown = false;
            for child in children {
                match evaluate(child, row) {
                    Some(true) => return Some(true),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            if unknown {
                None
            } else {
                Some(false)
            }
        }
        Predicate::Not(inner) => evaluate(inner, row).map(|b| !b),
        Predicate::Compare(cmp) => evaluate_comparison(cmp, row),
    }
}

/// Returns true if the row is selected by the predicate
pub fn matches(pred: &Predicate, row: &Value) -> bool {
    evaluate(pred, row) == Some(true)
}

fn evaluate_comparison(cmp: &Comparison, row: &Value) -> Option<bool> {
    let stored = row.get(&cmp.field).unwrap_or(&Value::Null);

    if cmp.op == CompareOp::IsNull || cmp.value.is_null() {
        return Some(stored.is_null());
    }

    match cmp.op {
        CompareOp::Equals => cmp.value.compare_json(stored).map(|o| o == Ordering::Equal),
        CompareOp::Gt => cmp.value.compare_json(stored).map(|o| o == Ordering::Greater),
        CompareOp::Gte => cmp.value.compare_json(stored).map(|o| o != Ordering::Less),
        CompareOp::Lt => cmp.value.compare_json(stored).map(|o| o == Ordering::Less),
        CompareOp::Lte => cmp.value.compare_json(stored).map(|o| o != Ordering::Greater),
        CompareOp::In => evaluate_in(&cmp.value, stored),
        CompareOp::IEquals | CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            let haystack = stored.as_str()?.to_lowercase();
            let needle = cmp.value.render_text().to_lowercase();
            Some(match cmp.op {
                CompareOp::IEquals => haystack == needle,
                CompareOp::Contains => haystack.contains(&needle),
                CompareOp::StartsWith => haystack.starts_with(&needle),
                _ => haystack.ends_with(&needle),
            })
        }
        CompareOp::Matches => {
            let document = tokenize(stored.as_str()?);
            let query = tokenize(&cmp.value.render_text());
            Some(!query.is_empty() && query.iter().all(|t| document.contains(t)))
        }
        CompareOp::IsNull => Some(stored.is_null()),
    }
}

fn evaluate_in(list: &SqlValue, stored: &Value) -> Option<bool> {
    let items = match list {
        SqlValue::List(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };
    // An empty list selects nothing, even for NULL
    if items.is_empty() {
        return Some(false);
    }
    if stored.is_null() {
        return None;
    }
    let mut unknown = false;
    for item in items {
        match item.compare_json(stored) {
            Some(Ordering::Equal) => return Some(true),
            None => unknown = true,
            Some(_) => {}
        }
    }
    if unknown {
        None
    } else {
        Some(false)
    }
}

/// Lowercased alphanumeric tokens, as a `simple` text-search config produces.
pub fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Substring match priority of a row for a term: exact (0), prefix (1),
/// contains (2), no match (3). The best field wins.
pub fn substring_rank(row: &Value, fields: &[String], term: &str) -> u8 {
    let term = term.to_lowercase();
    fields
        .iter()
        .filter_map(|f| row.get(f).and_then(Value::as_str))
        .map(|v| {
            let v = v.to_lowercase();
            if v == term {
                0
            } else if v.starts_with(&term) {
                1
            } else if v.contains(&term) {
                2
            } else {
                3
            }
        })
        .min()
        .unwrap_or(3)
}

/// Summed substring rank over all terms; lower is more relevant
pub fn substring_relevance(row: &Value, fields: &[String], terms: &[String]) -> u32 {
    terms
        .iter()
        .map(|term| u32::from(substring_rank(row, fields, term)))
        .sum()
}

/// Number of query tokens present in the search column
pub fn text_rank(row: &Value, column: &str, query: &str) -> usize {
    let document = match row.get(column).and_then(Value::as_str) {
        Some(d) => tokenize(d),
        None => return 0,
    };
    tokenize(query)
        .iter()
        .filter(|t| document.contains(t))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_and_null() {
        let p = Predicate::eq("status", SqlValue::text("active"));
        assert!(matches(&p, &json!({"status": "active"})));
        assert!(!matches(&p, &json!({"status": "Active"})));
        assert_eq!(evaluate(&p, &json!({"status": null})), None);

        let null = Predicate::eq("status", SqlValue::Null);
        assert!(matches(&null, &json!({"status": null})));
        assert!(matches(&null, &json!({})));
    }

    #[test]
    fn test_not_of_unknown_stays_unknown() {
        let p = Predicate::Not(Box::new(Predicate::eq("n", SqlValue::Int(1))));
        assert!(!matches(&p, &json!({"n": null})));
        assert!(matches(&p, &json!({"n": 2})));
    }

    #[test]
    fn test_in_semantics() {
        let p = Predicate::in_list("n", vec![SqlValue::Int(1), SqlValue::Int(2)]);
        assert!(matches(&p, &json!({"n": 2})));
        assert!(!matches(&p, &json!({"n": 3})));
        assert!(!matches(&Predicate::in_list("n", vec![]), &json!({"n": 3})));
    }

    #[test]
    fn test_text_patterns_are_literal_and_case_insensitive() {
        let p = Predicate::compare("name", CompareOp::Contains, SqlValue::text("50%"));
        assert!(matches(&p, &json!({"name": "Save 50% now"})));
        assert!(!matches(&p, &json!({"name": "Save 500 now"})));

        let p = Predicate::compare("name", CompareOp::StartsWith, SqlValue::text("ac"));
        assert!(matches(&p, &json!({"name": "ACME"})));
    }

    #[test]
    fn test_or_short_circuits_unknown() {
        let p = Predicate::Or(vec![
            Predicate::eq("a", SqlValue::Int(1)),
            Predicate::eq("b", SqlValue::Int(1)),
        ]);
        assert!(matches(&p, &json!({"a": null, "b": 1})));
        assert_eq!(evaluate(&p, &json!({"a": null, "b": 2})), None);
    }

    #[test]
    fn test_full_text_match() {
        let p = Predicate::compare("search_vector", CompareOp::Matches, SqlValue::text("Acme corp"));
        assert!(matches(&p, &json!({"search_vector": "acme widgets corp"})));
        assert!(!matches(&p, &json!({"search_vector": "acme widgets"})));
    }

    #[test]
    fn test_substring_rank() {
        let fields = vec!["name".to_string(), "code".to_string()];
        assert_eq!(substring_rank(&json!({"name": "Acme"}), &fields, "acme"), 0);
        assert_eq!(substring_rank(&json!({"name": "Acme Inc"}), &fields, "acme"), 1);
        assert_eq!(substring_rank(&json!({"name": "The Acme"}), &fields, "acme"), 2);
        assert_eq!(
            substring_rank(&json!({"name": "The Acme", "code": "acme"}), &fields, "acme"),
            0
        );
        assert_eq!(substring_rank(&json!({"name": "Other"}), &fields, "acme"), 3);
    }

    #[test]
    fn test_substring_relevance_ranks_each_term() {
        let fields = vec!["title".to_string()];
        let terms = vec!["save".to_string(), "crash".to_string()];

        // Neither title contains the joined "save crash"
        let leading = json!({"title": "Crash save"});
        let inner = json!({"title": "Big crash on save"});
        assert_eq!(substring_relevance(&leading, &fields, &terms), 3);
        assert_eq!(substring_relevance(&inner, &fields, &terms), 4);
        assert_eq!(substring_relevance(&json!({"title": "Other"}), &fields, &terms), 6);
    }
}
