//! Collection schema definitions
//!
//! Supported node kinds:
//! - string, uuid: text columns
//! - int, float: numeric columns
//! - bool: boolean columns
//! - date, datetime: timestamp columns
//! - enum: text column restricted to `values`
//!
//! Any other `type` (object, array, json, ...) is kept as `Other` and treated
//! as an opaque string by the catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declared kind of a schema node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    /// UTF-8 string
    String,
    /// UUID stored as text or uuid
    Uuid,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Boolean
    Bool,
    /// Calendar date
    Date,
    /// Timestamp
    DateTime,
    /// String restricted to a fixed set of values
    Enum(Vec<String>),
    /// Unsupported node kind, kept by name
    Other(String),
}

impl SchemaNode {
    /// Returns the type name as written in schema files
    pub fn type_name(&self) -> &str {
        match self {
            SchemaNode::String => "string",
            SchemaNode::Uuid => "uuid",
            SchemaNode::Int => "int",
            SchemaNode::Float => "float",
            SchemaNode::Bool => "bool",
            SchemaNode::Date => "date",
            SchemaNode::DateTime => "datetime",
            SchemaNode::Enum(_) => "enum",
            SchemaNode::Other(name) => name,
        }
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFieldSchema", into = "RawFieldSchema")]
pub struct FieldSchema {
    /// Declared node kind
    pub node: SchemaNode,
    /// Whether the field is always present (non-null)
    pub required: bool,
}

/// Wire form: `{"type": "enum", "values": [...], "required": true}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFieldSchema {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values: Vec<String>,
    #[serde(default)]
    required: bool,
}

impl From<RawFieldSchema> for FieldSchema {
    fn from(raw: RawFieldSchema) -> Self {
        let node = match raw.kind.to_ascii_lowercase().as_str() {
            "string" | "text" => SchemaNode::String,
            "uuid" => SchemaNode::Uuid,
            "int" | "integer" => SchemaNode::Int,
            "float" | "number" | "decimal" => SchemaNode::Float,
            "bool" | "boolean" => SchemaNode::Bool,
            "date" => SchemaNode::Date,
            "datetime" | "timestamp" => SchemaNode::DateTime,
            "enum" => SchemaNode::Enum(raw.values),
            _ => SchemaNode::Other(raw.kind),
        };
        Self {
            node,
            required: raw.required,
        }
    }
}

impl From<FieldSchema> for RawFieldSchema {
    fn from(field: FieldSchema) -> Self {
        let kind = field.node.type_name().to_string();
        let values = match field.node {
            SchemaNode::Enum(values) => values,
            _ => Vec::new(),
        };
        Self {
            kind,
            values,
            required: field.required,
        }
    }
}

impl FieldSchema {
    /// Create an optional field of the given kind
    pub fn optional(node: SchemaNode) -> Self {
        Self {
            node,
            required: false,
        }
    }

    /// Create a required field of the given kind
    pub fn required(node: SchemaNode) -> Self {
        Self {
            node,
            required: true,
        }
    }

    /// Optional string field
    pub fn string() -> Self {
        Self::optional(SchemaNode::String)
    }

    /// Optional integer field
    pub fn int() -> Self {
        Self::optional(SchemaNode::Int)
    }

    /// Optional boolean field
    pub fn bool() -> Self {
        Self::optional(SchemaNode::Bool)
    }

    /// Optional timestamp field
    pub fn datetime() -> Self {
        Self::optional(SchemaNode::DateTime)
    }

    /// Optional enum field
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::optional(SchemaNode::Enum(values.into_iter().map(Into::into).collect()))
    }
}

/// Declarative schema of one collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Field definitions by name
    #[serde(default)]
    pub fields: HashMap<String, FieldSchema>,
}

impl CollectionSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field definition
    pub fn with_field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Look up a field definition
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_known_and_unknown_kinds() {
        let schema: CollectionSchema = serde_json::from_value(json!({
            "fields": {
                "status": {"type": "enum", "values": ["open", "closed"], "required": true},
                "points": {"type": "int"},
                "meta": {"type": "object", "fields": {"a": {"type": "string"}}}
            }
        }))
        .unwrap();

        assert_eq!(
            schema.field("status").unwrap().node,
            SchemaNode::Enum(vec!["open".into(), "closed".into()])
        );
        assert!(schema.field("status").unwrap().required);
        assert_eq!(schema.field("points").unwrap().node, SchemaNode::Int);
        assert_eq!(
            schema.field("meta").unwrap().node,
            SchemaNode::Other("object".into())
        );
    }

    #[test]
    fn test_serialize_round_trip_keeps_enum_values() {
        let field = FieldSchema::enumeration(["a", "b"]);
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value, json!({"type": "enum", "values": ["a", "b"], "required": false}));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(SchemaNode::DateTime.type_name(), "datetime");
        assert_eq!(SchemaNode::Other("json".into()).type_name(), "json");
    }
}
