//! Schema error types
//!
//! Filter validation never fails a request; its failures are collected as
//! `ValidationDetails` and logged. `SchemaError` covers registry loading.

use std::fmt;

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema and registry errors
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// Collection definition is structurally invalid
    #[error("Invalid collection '{collection}': {reason}")]
    InvalidCollection { collection: String, reason: String },

    /// Collection registered twice
    #[error("Collection already registered: {0}")]
    DuplicateCollection(String),

    /// Registry document could not be parsed
    #[error("Malformed registry: {0}")]
    Malformed(String),
}

impl SchemaError {
    pub fn invalid(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidCollection {
            collection: collection.into(),
            reason: reason.into(),
        }
    }
}

/// One filter validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Field name
    pub field: String,
    /// Expected type or condition
    pub expected: String,
    /// What was found (a type name, never the raw value)
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn operator_not_allowed(field: impl Into<String>, operator: &str) -> Self {
        Self::new(field, "an allowed operator", format!("operator '{}'", operator))
    }

    pub fn type_mismatch(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::new(field, expected, actual)
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}
