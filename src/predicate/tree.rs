//! # Declarative Predicate Tree
//!
//! The logical filter shared by every component. The raw SQL compiler and the
//! declarative executors both consume this tree and must select the same rows.

use serde::Serialize;

use super::value::SqlValue;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareOp {
    /// Exact equality
    Equals,
    /// Case-insensitive equality
    IEquals,
    /// Case-insensitive substring
    Contains,
    /// Case-insensitive prefix
    StartsWith,
    /// Case-insensitive suffix
    EndsWith,
    /// Membership in a list
    In,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// IS NULL (value ignored)
    IsNull,
    /// Indexed full-text match against a search column
    Matches,
}

impl CompareOp {
    /// Get the operator name
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Equals => "equals",
            CompareOp::IEquals => "iEquals",
            CompareOp::Contains => "contains",
            CompareOp::StartsWith => "startsWith",
            CompareOp::EndsWith => "endsWith",
            CompareOp::In => "in",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::IsNull => "isNull",
            CompareOp::Matches => "matches",
        }
    }

    /// Whether the operator matches its argument as literal text, case-insensitively
    pub fn is_text_pattern(&self) -> bool {
        matches!(
            self,
            CompareOp::IEquals | CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith
        )
    }
}

/// A single comparison condition (one predicate fragment)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Field (column) name
    pub field: String,
    /// Operator
    pub op: CompareOp,
    /// Comparison argument
    pub value: SqlValue,
}

/// A predicate tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// All children hold. Empty means TRUE.
    And(Vec<Predicate>),
    /// Any child holds. Empty means FALSE.
    Or(Vec<Predicate>),
    /// Negation
    Not(Box<Predicate>),
    /// Leaf comparison
    Compare(Comparison),
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::always()
    }
}

impl Predicate {
    /// A predicate matching every row
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    /// A predicate matching no row
    pub fn never() -> Self {
        Predicate::Or(Vec::new())
    }

    /// Create a comparison leaf
    pub fn compare(field: impl Into<String>, op: CompareOp, value: SqlValue) -> Self {
        Predicate::Compare(Comparison {
            field: field.into(),
            op,
            value,
        })
    }

    /// Equality leaf
    pub fn eq(field: impl Into<String>, value: SqlValue) -> Self {
        Self::compare(field, CompareOp::Equals, value)
    }

    /// IS NULL leaf
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::compare(field, CompareOp::IsNull, SqlValue::Null)
    }

    /// IN leaf
    pub fn in_list(field: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self::compare(field, CompareOp::In, SqlValue::List(values))
    }

    /// Conjunction of the given predicates.
    ///
    /// Nested conjunctions are flattened and trivially-true children dropped,
    /// so a single remaining child is returned as-is.
    pub fn and_all(preds: impl IntoIterator<Item = Predicate>) -> Self {
        let mut children = Vec::new();
        for pred in preds {
            match pred {
                Predicate::And(inner) => children.extend(inner),
                other => children.push(other),
            }
        }
        if children.len() == 1 {
            return children.pop().unwrap_or_default();
        }
        Predicate::And(children)
    }

    /// Disjunction of the given predicates. A single child is returned as-is.
    pub fn or_any(preds: impl IntoIterator<Item = Predicate>) -> Self {
        let mut children: Vec<Predicate> = preds.into_iter().collect();
        if children.len() == 1 {
            return children.pop().unwrap_or_else(Predicate::never);
        }
        Predicate::Or(children)
    }

    /// Returns true for the empty conjunction
    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::And(c) if c.is_empty())
    }

    /// Returns true if the tree contains any AND/OR node with children
    pub fn has_branches(&self) -> bool {
        match self {
            Predicate::And(c) | Predicate::Or(c) => !c.is_empty(),
            Predicate::Not(inner) => inner.has_branches(),
            Predicate::Compare(_) => false,
        }
    }

    /// A predicate is "simple" when it has no OR, no nesting and at most
    /// `max_and_branches` conjuncts.
    pub fn is_simple(&self, max_and_branches: usize) -> bool {
        match self {
            Predicate::Compare(_) => true,
            Predicate::And(children) => {
                children.len() <= max_and_branches
                    && children.iter().all(|c| matches!(c, Predicate::Compare(_)))
            }
            Predicate::Or(_) | Predicate::Not(_) => false,
        }
    }

    /// Distinct field names referenced by the tree, in first-seen order
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::And(c) | Predicate::Or(c) => c.iter().for_each(|p| p.collect_fields(out)),
            Predicate::Not(inner) => inner.collect_fields(out),
            Predicate::Compare(cmp) => {
                if !out.contains(&cmp.field.as_str()) {
                    out.push(&cmp.field);
                }
            }
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl SortDirection {
    /// SQL keyword
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One ordering key of a fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OrderKey {
    /// Order by a column
    Field {
        /// Column name
        field: String,
        /// Direction
        direction: SortDirection,
    },
    /// Substring match priority summed over the search terms. Per term:
    /// exact (0), prefix (1), contains (2), other (3). Always ascending.
    SubstringRank {
        /// Searchable fields
        fields: Vec<String>,
        /// Search terms, each ranked on its own
        terms: Vec<String>,
    },
    /// Full-text rank of the search column, best match first
    TextRank {
        /// Search column
        column: String,
        /// Raw search query
        query: String,
    },
}

impl OrderKey {
    /// Ascending field key
    pub fn asc(field: impl Into<String>) -> Self {
        OrderKey::Field {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending field key
    pub fn desc(field: impl Into<String>) -> Self {
        OrderKey::Field {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_all_flattens() {
        let p = Predicate::and_all(vec![
            Predicate::eq("a", SqlValue::Int(1)),
            Predicate::always(),
            Predicate::and_all(vec![
                Predicate::eq("b", SqlValue::Int(2)),
                Predicate::eq("c", SqlValue::Int(3)),
            ]),
        ]);
        match p {
            Predicate::And(children) => assert_eq!(children.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_and_all_single_child_collapses() {
        let p = Predicate::and_all(vec![Predicate::always(), Predicate::is_null("x")]);
        assert!(matches!(p, Predicate::Compare(_)));
        assert!(!p.has_branches());
    }

    #[test]
    fn test_is_simple() {
        let leaf = || Predicate::eq("a", SqlValue::Int(1));
        assert!(Predicate::always().is_simple(3));
        assert!(Predicate::And(vec![leaf(), leaf(), leaf()]).is_simple(3));
        assert!(!Predicate::And(vec![leaf(), leaf(), leaf(), leaf()]).is_simple(3));
        assert!(!Predicate::Or(vec![leaf()]).is_simple(3));
        assert!(!Predicate::And(vec![leaf(), Predicate::And(vec![leaf()])]).is_simple(3));
        assert!(!Predicate::Not(Box::new(leaf())).is_simple(3));
    }

    #[test]
    fn test_fields_are_distinct() {
        let p = Predicate::Or(vec![
            Predicate::eq("name", SqlValue::text("x")),
            Predicate::eq("name", SqlValue::text("y")),
            Predicate::is_null("owner_id"),
        ]);
        assert_eq!(p.fields(), vec!["name", "owner_id"]);
    }
}
