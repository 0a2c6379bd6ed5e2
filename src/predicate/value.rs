//! Typed comparison values
//!
//! Values are typed once at the filter boundary so that both renderings of a
//! predicate (declarative and raw SQL) bind the same thing.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// A value carried by a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL NULL
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
    /// List of values (only meaningful for `in`)
    List(Vec<SqlValue>),
}

impl SqlValue {
    /// Create a text value
    pub fn text(s: impl Into<String>) -> Self {
        SqlValue::Text(s.into())
    }

    /// Returns true for SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Returns the text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text rendering, used by the pattern operators
    pub fn render_text(&self) -> String {
        match self {
            SqlValue::Text(s) => s.clone(),
            SqlValue::Null => String::new(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Timestamp(ts) => ts.to_rfc3339(),
            SqlValue::List(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Convert a JSON value into a typed value, guessing the type from the
    /// JSON representation.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Array(items) => SqlValue::List(items.iter().map(SqlValue::from_json).collect()),
            Value::Object(_) => SqlValue::Text(value.to_string()),
        }
    }

    /// Compare a stored JSON value against this value.
    ///
    /// Returns `None` when the comparison is undefined (NULL on either side,
    /// or incompatible types), mirroring SQL three-valued logic.
    pub fn compare_json(&self, stored: &Value) -> Option<Ordering> {
        match (stored, self) {
            (Value::Null, _) | (_, SqlValue::Null) => None,
            (Value::Bool(a), SqlValue::Bool(b)) => Some(a.cmp(b)),
            (Value::Number(a), SqlValue::Int(b)) => a.as_f64()?.partial_cmp(&(*b as f64)),
            (Value::Number(a), SqlValue::Float(b)) => a.as_f64()?.partial_cmp(b),
            (Value::String(a), SqlValue::Text(b)) => Some(compare_text(a, b)),
            (Value::String(a), SqlValue::Timestamp(b)) => Some(parse_timestamp(a)?.cmp(b)),
            _ => None,
        }
    }
}

/// Text comparison; UUID-shaped strings compare as UUIDs.
fn compare_text(a: &str, b: &str) -> Ordering {
    match (uuid::Uuid::parse_str(a), uuid::Uuid::parse_str(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Parse an RFC 3339 timestamp, a naive date-time or a plain date.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}
