//! Positional bind parameters

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::predicate::SqlValue;

/// A value bound to a `$n` placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    /// Typed NULL (text)
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// Double precision float
    Float(f64),
    /// Text
    Text(String),
    /// Timestamp with time zone
    Timestamp(DateTime<Utc>),
}

impl SqlParam {
    /// Convert a scalar value. Lists are flattened by the compiler and never
    /// reach this point; a stray list binds as its JSON text.
    pub fn from_value(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => SqlParam::Null,
            SqlValue::Bool(b) => SqlParam::Bool(*b),
            SqlValue::Int(i) => SqlParam::Int(*i),
            SqlValue::Float(f) => SqlParam::Float(*f),
            SqlValue::Text(s) => SqlParam::Text(s.clone()),
            SqlValue::Timestamp(ts) => SqlParam::Timestamp(*ts),
            SqlValue::List(_) => SqlParam::Text(serde_json::to_string(value).unwrap_or_default()),
        }
    }
}
