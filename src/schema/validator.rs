//! Batch validation of coerced filter values
//!
//! Validation semantics:
//! - The operator must be allowed for the field's kind
//! - Numbers, booleans and dates must already be coerced to their kind
//! - Enum values must belong to the declared set
//! - The null sentinel is valid for every field
//! - Nested arrays and objects are never valid comparison values
//!
//! All values are checked in one pass and every failure is reported, so the
//! caller can discard the filter set as a whole.

use serde_json::Value;

use super::catalog::{FieldKind, FieldTypeInfo, FieldTypes, Operator};
use super::errors::ValidationDetails;
use crate::predicate::parse_timestamp;

/// One (field, operator, value) triple to check
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCheck {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl FilterCheck {
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Validates coerced filter values against a collection's field types.
pub struct SchemaValidator<'a> {
    types: &'a FieldTypes,
}

impl<'a> SchemaValidator<'a> {
    /// Creates a validator over the given field types.
    pub fn new(types: &'a FieldTypes) -> Self {
        Self { types }
    }

    /// Validates every check in one batch.
    ///
    /// # Errors
    ///
    /// Returns all failures when at least one check fails.
    pub fn validate_filters(&self, checks: &[FilterCheck]) -> Result<(), Vec<ValidationDetails>> {
        let failures: Vec<ValidationDetails> = checks
            .iter()
            .filter_map(|check| self.validate_one(check).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    fn validate_one(&self, check: &FilterCheck) -> Result<(), ValidationDetails> {
        let fallback;
        let info = match self.types.get(&check.field) {
            Some(info) => info,
            None => {
                fallback = FieldTypeInfo::fallback(check.field.as_str());
                &fallback
            }
        };

        if !info.allows(check.operator) {
            return Err(ValidationDetails::operator_not_allowed(
                &check.field,
                check.operator.as_str(),
            ));
        }

        if is_null_sentinel(&check.value) {
            return Ok(());
        }

        let ok = match (info.kind, &check.value) {
            (_, Value::Array(_)) | (_, Value::Object(_)) => false,
            (FieldKind::Number, v) => v.is_number(),
            (FieldKind::Boolean, v) => v.is_boolean(),
            (FieldKind::Date, Value::String(s)) => parse_timestamp(s).is_some(),
            (FieldKind::Date, _) => false,
            (FieldKind::Enum, Value::String(s)) => info
                .enum_values
                .as_ref()
                .map_or(true, |values| values.contains(s)),
            (FieldKind::Enum, _) => false,
            (FieldKind::String, _) => true,
        };

        if ok {
            Ok(())
        } else {
            Err(ValidationDetails::type_mismatch(
                &check.field,
                info.kind.as_str(),
                json_type_name(&check.value),
            ))
        }
    }
}

/// `null` or the literal string `"null"`
pub fn is_null_sentinel(value: &Value) -> bool {
    matches!(value, Value::Null) || value.as_str() == Some("null")
}

/// Returns the JSON type name of a value
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalog::derive_field_types;
    use crate::schema::types::{CollectionSchema, FieldSchema};
    use serde_json::json;

    fn types() -> FieldTypes {
        derive_field_types(
            &CollectionSchema::new()
                .with_field("points", FieldSchema::int())
                .with_field("done", FieldSchema::bool())
                .with_field("due", FieldSchema::datetime())
                .with_field("status", FieldSchema::enumeration(["open", "closed"]))
                .with_field("name", FieldSchema::string()),
        )
    }

    #[test]
    fn test_valid_batch() {
        let types = types();
        let validator = SchemaValidator::new(&types);
        let checks = vec![
            FilterCheck::new("points", Operator::Gte, json!(3)),
            FilterCheck::new("done", Operator::Equals, json!(false)),
            FilterCheck::new("due", Operator::Lt, json!("2024-05-01")),
            FilterCheck::new("status", Operator::In, json!("open")),
            FilterCheck::new("name", Operator::Equals, json!("x")),
            FilterCheck::new("points", Operator::Equals, json!("null")),
        ];
        assert!(validator.validate_filters(&checks).is_ok());
    }

    #[test]
    fn test_reports_every_failure() {
        let types = types();
        let validator = SchemaValidator::new(&types);
        let checks = vec![
            FilterCheck::new("points", Operator::Equals, json!("abc")),
            FilterCheck::new("status", Operator::Equals, json!("archived")),
            FilterCheck::new("done", Operator::Gt, json!(true)),
            FilterCheck::new("name", Operator::Equals, json!("fine")),
        ];
        let failures = validator.validate_filters(&checks).unwrap_err();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].field, "points");
        assert_eq!(failures[0].actual, "string");
    }

    #[test]
    fn test_unknown_field_uses_fallback() {
        let types = types();
        let validator = SchemaValidator::new(&types);
        assert!(validator
            .validate_filters(&[FilterCheck::new("free", Operator::In, json!("a"))])
            .is_ok());
        assert!(validator
            .validate_filters(&[FilterCheck::new("free", Operator::Gt, json!("a"))])
            .is_err());
    }

    #[test]
    fn test_nested_values_rejected() {
        let types = types();
        let validator = SchemaValidator::new(&types);
        assert!(validator
            .validate_filters(&[FilterCheck::new("name", Operator::Equals, json!({"a": 1}))])
            .is_err());
    }
}
