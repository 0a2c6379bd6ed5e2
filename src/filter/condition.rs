//! Typed filter conditions

use serde::Serialize;

use crate::predicate::{CompareOp, Predicate, SqlValue};

/// Comparison carried by a validated condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum ConditionKind {
    Eq(SqlValue),
    In(Vec<SqlValue>),
    /// Membership in the list, or NULL
    InOrNull(Vec<SqlValue>),
    Gt(SqlValue),
    Gte(SqlValue),
    Lt(SqlValue),
    Lte(SqlValue),
    IsNull,
}

/// A validated, typed filter condition on one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCondition {
    pub field: String,
    #[serde(flatten)]
    pub kind: ConditionKind,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, kind: ConditionKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    /// The predicate fragment for this condition
    pub fn predicate(&self) -> Predicate {
        let field = self.field.clone();
        match &self.kind {
            ConditionKind::Eq(v) => Predicate::eq(field, v.clone()),
            ConditionKind::In(vs) => Predicate::in_list(field, vs.clone()),
            ConditionKind::InOrNull(vs) => {
                Predicate::or_any([Predicate::in_list(field.clone(), vs.clone()), Predicate::is_null(field)])
            }
            ConditionKind::Gt(v) => Predicate::compare(field, CompareOp::Gt, v.clone()),
            ConditionKind::Gte(v) => Predicate::compare(field, CompareOp::Gte, v.clone()),
            ConditionKind::Lt(v) => Predicate::compare(field, CompareOp::Lt, v.clone()),
            ConditionKind::Lte(v) => Predicate::compare(field, CompareOp::Lte, v.clone()),
            ConditionKind::IsNull => Predicate::is_null(field),
        }
    }
}

/// Conjunction of all conditions; empty means no restriction
pub fn to_predicate(conditions: &[FilterCondition]) -> Predicate {
    Predicate::and_all(conditions.iter().map(FilterCondition::predicate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_predicate() {
        let conditions = vec![
            FilterCondition::new("status", ConditionKind::Eq(SqlValue::text("open"))),
            FilterCondition::new("points", ConditionKind::Gte(SqlValue::Int(3))),
            FilterCondition::new("assignee_id", ConditionKind::IsNull),
        ];

        let pred = to_predicate(&conditions);
        assert_eq!(
            pred,
            Predicate::And(vec![
                Predicate::eq("status", SqlValue::text("open")),
                Predicate::compare("points", CompareOp::Gte, SqlValue::Int(3)),
                Predicate::is_null("assignee_id"),
            ])
        );
    }

    #[test]
    fn test_in_or_null() {
        let condition = FilterCondition::new("status", ConditionKind::InOrNull(vec![SqlValue::text("open")]));
        assert_eq!(
            condition.predicate(),
            Predicate::Or(vec![
                Predicate::in_list("status", vec![SqlValue::text("open")]),
                Predicate::is_null("status"),
            ])
        );
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        assert!(to_predicate(&[]).is_always());
    }
}
