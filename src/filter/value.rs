//! Untyped filter input
//!
//! Filter values arrive either from a query string (everything is text) or
//! from JSON (scalars keep their JSON type). Both are folded into the closed
//! `FilterValue` sum type before any typing happens.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::schema::Operator;

/// A single untyped scalar
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawScalar {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

impl RawScalar {
    pub fn text(s: impl Into<String>) -> Self {
        RawScalar::Text(s.into())
    }

    /// Convert a JSON scalar. Arrays and objects are not scalars.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(RawScalar::Null),
            Value::Bool(b) => Some(RawScalar::Bool(*b)),
            Value::Number(n) => Some(RawScalar::Number(n.clone())),
            Value::String(s) => Some(RawScalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RawScalar::Null => Value::Null,
            RawScalar::Bool(b) => Value::Bool(*b),
            RawScalar::Number(n) => Value::Number(n.clone()),
            RawScalar::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Argument of one structured-condition entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionArg {
    Scalar(RawScalar),
    List(Vec<RawScalar>),
}

/// Operators accepted as structured-condition keys
pub const CONDITION_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::In,
    Operator::Gt,
    Operator::Gte,
    Operator::Lt,
    Operator::Lte,
];

/// An untyped filter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FilterValue {
    /// `field=value`
    Scalar(RawScalar),
    /// `field=a&field=b`, `field=in.(a,b)` or a JSON array
    List(Vec<RawScalar>),
    /// `{"gte": 3, "lt": 8}` or `field=gte.3`
    Condition(Vec<(Operator, ConditionArg)>),
    /// Input that cannot be expressed as a filter, such as a condition object
    /// with an unknown key. Always fails validation.
    Malformed(String),
}

impl FilterValue {
    /// Parse a query-string value, honouring operator prefixes
    /// (`gt.5`, `gte.5`, `lt.5`, `lte.5`, `eq.x`, `in.(a,b)`).
    ///
    /// Values stay text; typing happens against the field catalog.
    pub fn parse(value: &str) -> Self {
        let Some((prefix, rest)) = value.split_once('.') else {
            return FilterValue::Scalar(RawScalar::text(value));
        };

        match prefix {
            "eq" => FilterValue::Scalar(RawScalar::text(rest)),
            "in" => FilterValue::List(parse_list(rest)),
            "gt" | "gte" | "lt" | "lte" => match Operator::parse(prefix) {
                Some(op) => FilterValue::Condition(vec![(op, ConditionArg::Scalar(RawScalar::text(rest)))]),
                None => FilterValue::Scalar(RawScalar::text(value)),
            },
            // No known operator, the whole value is the operand
            _ => FilterValue::Scalar(RawScalar::text(value)),
        }
    }

    /// Convert a JSON filter value: scalar, array of scalars or condition object
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(items) => match items.iter().map(RawScalar::from_json).collect::<Option<Vec<_>>>() {
                Some(list) => FilterValue::List(list),
                None => FilterValue::Malformed("nested value in list".to_string()),
            },
            Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, arg) in map {
                    let Some(op) = Operator::parse(key).filter(|op| CONDITION_OPERATORS.contains(op))
                    else {
                        return FilterValue::Malformed(format!("unknown condition key '{}'", key));
                    };
                    let arg = match arg {
                        Value::Array(items) => match items.iter().map(RawScalar::from_json).collect::<Option<Vec<_>>>() {
                            Some(list) => ConditionArg::List(list),
                            None => return FilterValue::Malformed("nested value in condition".to_string()),
                        },
                        Value::Object(_) => {
                            return FilterValue::Malformed("nested value in condition".to_string())
                        }
                        scalar => match RawScalar::from_json(scalar) {
                            Some(s) => ConditionArg::Scalar(s),
                            None => return FilterValue::Malformed("nested value in condition".to_string()),
                        },
                    };
                    entries.push((op, arg));
                }
                if entries.is_empty() {
                    FilterValue::Malformed("empty condition".to_string())
                } else {
                    FilterValue::Condition(entries)
                }
            }
            scalar => match RawScalar::from_json(scalar) {
                Some(s) => FilterValue::Scalar(s),
                None => FilterValue::Malformed("unsupported value".to_string()),
            },
        }
    }

    /// Fold a repeated key into this value.
    ///
    /// Scalars accumulate into a list; conditions accumulate their entries.
    /// Mixing the two turns the plain values into `equals`/`in` entries.
    pub fn merge(self, other: FilterValue) -> FilterValue {
        use FilterValue::*;

        match (self, other) {
            (Malformed(reason), _) | (_, Malformed(reason)) => Malformed(reason),
            (Scalar(a), Scalar(b)) => List(vec![a, b]),
            (Scalar(a), List(mut b)) => {
                b.insert(0, a);
                List(b)
            }
            (List(mut a), Scalar(b)) => {
                a.push(b);
                List(a)
            }
            (List(mut a), List(b)) => {
                a.extend(b);
                List(a)
            }
            (Condition(mut a), Condition(b)) => {
                a.extend(b);
                Condition(a)
            }
            (Condition(mut a), plain) => {
                a.extend(plain.into_condition_entries());
                Condition(a)
            }
            (plain, Condition(b)) => {
                let mut entries = plain.into_condition_entries();
                entries.extend(b);
                Condition(entries)
            }
        }
    }

    fn into_condition_entries(self) -> Vec<(Operator, ConditionArg)> {
        match self {
            FilterValue::Scalar(s) => vec![(Operator::Equals, ConditionArg::Scalar(s))],
            FilterValue::List(l) => vec![(Operator::In, ConditionArg::List(l))],
            FilterValue::Condition(entries) => entries,
            FilterValue::Malformed(_) => Vec::new(),
        }
    }
}

/// Parse list syntax: `(a,b,c)`; bare `a,b` is accepted too
fn parse_list(value: &str) -> Vec<RawScalar> {
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .unwrap_or(value);

    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RawScalar::text)
        .collect()
}
