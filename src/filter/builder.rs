//! # Filter Condition Builder
//!
//! Turns untyped filter input into typed conditions:
//!
//! 1. Keys outside the allow-list are ignored silently
//! 2. Values are coerced per field kind; `"null"` is kept as the IS NULL sentinel
//! 3. All coerced values are validated in one batch
//! 4. Surviving fields are translated into conditions
//!
//! Validation is all-or-nothing. A single invalid value drops the whole filter
//! set with a `filters_discarded` warning and the query runs unfiltered.

use std::collections::BTreeMap;

use serde_json::Value;

use super::condition::{ConditionKind, FilterCondition};
use super::value::{ConditionArg, FilterValue, RawScalar};
use crate::observability::Event;
use crate::predicate::{parse_timestamp, SqlValue};
use crate::schema::{
    is_null_sentinel, FieldKind, FieldTypeInfo, FieldTypes, FilterCheck, Operator, SchemaValidator,
    ValidationDetails,
};

/// A comparison argument after coercion
#[derive(Debug, Clone)]
enum Coerced {
    Scalar(Value),
    List(Vec<Value>),
}

/// One coerced (operator, argument) entry of a field
#[derive(Debug, Clone)]
struct Entry {
    field: String,
    kind: FieldKind,
    operator: Operator,
    arg: Coerced,
}

/// Builds typed filter conditions for one collection.
pub struct FilterConditionBuilder<'a> {
    collection: &'a str,
    types: &'a FieldTypes,
}

impl<'a> FilterConditionBuilder<'a> {
    pub fn new(collection: &'a str, types: &'a FieldTypes) -> Self {
        Self { collection, types }
    }

    /// Build conditions from raw filters restricted to `allowed_fields`.
    ///
    /// Never fails: invalid input yields an empty list.
    pub fn build(
        &self,
        raw_filters: &BTreeMap<String, FilterValue>,
        allowed_fields: &[String],
    ) -> Vec<FilterCondition> {
        let retained: Vec<(&String, &FilterValue)> = raw_filters
            .iter()
            .filter(|(key, _)| allowed_fields.iter().any(|f| f == *key))
            .collect();

        if retained.is_empty() {
            return Vec::new();
        }

        let mut entries = Vec::new();
        let mut failures = Vec::new();
        for (field, value) in &retained {
            let info = self.info(field);
            match coerce_entries(&info, value) {
                Ok(mut e) => entries.append(&mut e),
                Err(reason) => failures.push(ValidationDetails::new(field.as_str(), "a filter value", reason)),
            }
        }

        let checks: Vec<FilterCheck> = entries.iter().flat_map(Entry::checks).collect();
        if let Err(mut invalid) = SchemaValidator::new(self.types).validate_filters(&checks) {
            failures.append(&mut invalid);
        }

        if !failures.is_empty() {
            let keys: Vec<&str> = retained.iter().map(|(k, _)| k.as_str()).collect();
            let reasons: Vec<String> = failures.iter().map(ToString::to_string).collect();
            tracing::warn!(
                target: "pagewise::filter",
                event = Event::FiltersDiscarded.as_str(),
                collection = self.collection,
                keys = ?keys,
                reasons = ?reasons,
                "filter validation failed; running unfiltered"
            );
            return Vec::new();
        }

        entries.into_iter().map(Entry::into_condition).collect()
    }

    fn info(&self, field: &str) -> FieldTypeInfo {
        self.types
            .get(field)
            .cloned()
            .unwrap_or_else(|| FieldTypeInfo::fallback(field))
    }
}

impl Entry {
    /// The validator checks for this entry. List arguments of `in` are
    /// checked element by element; any other list is a nested value.
    fn checks(&self) -> Vec<FilterCheck> {
        match (&self.arg, self.operator) {
            (Coerced::Scalar(v), op) => vec![FilterCheck::new(self.field.as_str(), op, v.clone())],
            (Coerced::List(items), Operator::In) => items
                .iter()
                .map(|v| FilterCheck::new(self.field.as_str(), Operator::In, v.clone()))
                .collect(),
            (Coerced::List(items), op) => {
                vec![FilterCheck::new(self.field.as_str(), op, Value::Array(items.clone()))]
            }
        }
    }

    fn into_condition(self) -> FilterCondition {
        let kind = self.kind;
        let condition = match (self.operator, self.arg) {
            (_, Coerced::Scalar(v)) if is_null_sentinel(&v) => ConditionKind::IsNull,
            (Operator::In, Coerced::Scalar(v)) => ConditionKind::In(vec![type_value(kind, &v)]),
            (_, Coerced::List(items)) => {
                // NULL never matches inside IN, so the sentinel becomes its own branch
                let (nulls, values): (Vec<Value>, Vec<Value>) = items.into_iter().partition(is_null_sentinel);
                let values: Vec<SqlValue> = values.iter().map(|v| type_value(kind, v)).collect();
                match (nulls.is_empty(), values.is_empty()) {
                    (true, _) => ConditionKind::In(values),
                    (false, true) => ConditionKind::IsNull,
                    (false, false) => ConditionKind::InOrNull(values),
                }
            }
            (Operator::Gt, Coerced::Scalar(v)) => ConditionKind::Gt(type_value(kind, &v)),
            (Operator::Gte, Coerced::Scalar(v)) => ConditionKind::Gte(type_value(kind, &v)),
            (Operator::Lt, Coerced::Scalar(v)) => ConditionKind::Lt(type_value(kind, &v)),
            (Operator::Lte, Coerced::Scalar(v)) => ConditionKind::Lte(type_value(kind, &v)),
            (_, Coerced::Scalar(v)) => ConditionKind::Eq(type_value(kind, &v)),
        };
        FilterCondition::new(self.field, condition)
    }
}

/// Unwrap one filter value into coerced entries
fn coerce_entries(info: &FieldTypeInfo, value: &FilterValue) -> Result<Vec<Entry>, String> {
    let entry = |operator, arg| Entry {
        field: info.name.clone(),
        kind: info.kind,
        operator,
        arg,
    };

    match value {
        FilterValue::Scalar(s) => Ok(vec![entry(Operator::Equals, Coerced::Scalar(coerce(info.kind, s)))]),
        FilterValue::List(items) => Ok(vec![entry(Operator::In, coerce_list(info.kind, items))]),
        FilterValue::Condition(pairs) => Ok(pairs
            .iter()
            .map(|(op, arg)| {
                let arg = match arg {
                    ConditionArg::Scalar(s) => Coerced::Scalar(coerce(info.kind, s)),
                    ConditionArg::List(items) => coerce_list(info.kind, items),
                };
                entry(*op, arg)
            })
            .collect()),
        FilterValue::Malformed(reason) => Err(reason.clone()),
    }
}

fn coerce_list(kind: FieldKind, items: &[RawScalar]) -> Coerced {
    Coerced::List(items.iter().map(|s| coerce(kind, s)).collect())
}

/// Coerce a raw scalar toward the field kind.
///
/// Values that cannot be coerced are passed through unchanged so the
/// validator reports them.
fn coerce(kind: FieldKind, raw: &RawScalar) -> Value {
    match (kind, raw) {
        (_, RawScalar::Null) => Value::Null,
        (_, RawScalar::Text(s)) if s == "null" => Value::String(s.clone()),
        (FieldKind::Number, RawScalar::Text(s)) => parse_number(s.trim()).unwrap_or_else(|| Value::String(s.clone())),
        (FieldKind::Boolean, RawScalar::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(s.clone()),
        },
        (FieldKind::String | FieldKind::Enum, RawScalar::Number(n)) => Value::String(n.to_string()),
        (FieldKind::String | FieldKind::Enum, RawScalar::Bool(b)) => Value::String(b.to_string()),
        (_, other) => other.to_json(),
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    s.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Type a validated value for the predicate layer
fn type_value(kind: FieldKind, value: &Value) -> SqlValue {
    if is_null_sentinel(value) {
        return SqlValue::Null;
    }
    match (kind, value) {
        (FieldKind::Number, Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => SqlValue::Float(n.as_f64().unwrap_or_default()),
        },
        (FieldKind::Boolean, Value::Bool(b)) => SqlValue::Bool(*b),
        (FieldKind::Date, Value::String(s)) => match parse_timestamp(s) {
            Some(ts) => SqlValue::Timestamp(ts),
            None => SqlValue::Text(s.clone()),
        },
        (_, Value::String(s)) => SqlValue::Text(s.clone()),
        (_, other) => SqlValue::from_json(other),
    }
}
