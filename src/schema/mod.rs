//! Collection schemas and the field-type catalog
//!
//! # Design Principles
//!
//! - Schemas are declarative and read-only after startup
//! - Field types are derived once per collection and cached
//! - Missing type information degrades to a permissive string type
//! - Filter validation is batched and never fails a request on its own

mod catalog;
mod errors;
mod types;
mod validator;

pub use catalog::{derive_field_types, FieldKind, FieldTypeCatalog, FieldTypeInfo, FieldTypes, Operator};
pub use errors::{SchemaError, SchemaResult, ValidationDetails};
pub use types::{CollectionSchema, FieldSchema, SchemaNode};
pub use validator::{is_null_sentinel, FilterCheck, SchemaValidator};
