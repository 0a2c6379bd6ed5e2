//! # Field-Type Catalog
//!
//! Derives, per collection, the primitive kind of every field together with
//! the comparison operators a filter may use on it. Derivation is pure; the
//! result is cached for the life of the process.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use super::types::{CollectionSchema, SchemaNode};

/// Primitive kind of a filterable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    Date,
    Boolean,
    Enum,
    String,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Boolean => "boolean",
            FieldKind::Enum => "enum",
            FieldKind::String => "string",
        }
    }
}

/// Filter operators a field may allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Parse a structured-condition key
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equals" | "eq" => Some(Operator::Equals),
            "in" => Some(Operator::In),
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "contains" => Some(Operator::Contains),
            "startsWith" => Some(Operator::StartsWith),
            "endsWith" => Some(Operator::EndsWith),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::In => "in",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
        }
    }
}

/// Type information for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTypeInfo {
    pub name: String,
    pub kind: FieldKind,
    pub allowed_operators: BTreeSet<Operator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<BTreeSet<String>>,
}

impl FieldTypeInfo {
    /// The permissive-but-safe default: a string allowing `equals` and `in`
    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::String,
            allowed_operators: [Operator::Equals, Operator::In].into_iter().collect(),
            enum_values: None,
        }
    }

    /// Whether the operator may be used on this field
    pub fn allows(&self, op: Operator) -> bool {
        self.allowed_operators.contains(&op)
    }

    fn derive(name: &str, node: &SchemaNode) -> Self {
        use Operator::*;

        let (kind, operators, enum_values): (FieldKind, &[Operator], _) = match node {
            SchemaNode::String => (
                FieldKind::String,
                &[Equals, In, Contains, StartsWith, EndsWith],
                None,
            ),
            SchemaNode::Uuid => (FieldKind::String, &[Equals, In], None),
            SchemaNode::Int | SchemaNode::Float => {
                (FieldKind::Number, &[Equals, In, Gt, Gte, Lt, Lte], None)
            }
            SchemaNode::Bool => (FieldKind::Boolean, &[Equals], None),
            SchemaNode::Date | SchemaNode::DateTime => {
                (FieldKind::Date, &[Equals, Gt, Gte, Lt, Lte], None)
            }
            SchemaNode::Enum(values) => (
                FieldKind::Enum,
                &[Equals, In],
                Some(values.iter().cloned().collect()),
            ),
            SchemaNode::Other(_) => return Self::fallback(name),
        };

        Self {
            name: name.to_string(),
            kind,
            allowed_operators: operators.iter().copied().collect(),
            enum_values,
        }
    }
}

/// Field name to type information, for one collection
pub type FieldTypes = HashMap<String, FieldTypeInfo>;

/// Derive field types from a schema. Pure; never fails.
pub fn derive_field_types(schema: &CollectionSchema) -> FieldTypes {
    schema
        .fields
        .iter()
        .map(|(name, field)| (name.clone(), FieldTypeInfo::derive(name, &field.node)))
        .collect()
}

/// Process-wide cache of derived field types, keyed by collection name.
///
/// Entries are inserted once and never invalidated; schemas do not change
/// while the process runs.
#[derive(Debug, Default)]
pub struct FieldTypeCatalog {
    cache: RwLock<HashMap<String, Arc<FieldTypes>>>,
}

impl FieldTypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field types of a collection, derived on first use
    pub fn types_for(&self, collection: &str, schema: &CollectionSchema) -> Arc<FieldTypes> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(types) = cache.get(collection) {
                return Arc::clone(types);
            }
        }

        let derived = Arc::new(derive_field_types(schema));
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            cache
                .entry(collection.to_string())
                .or_insert(derived),
        )
    }

    /// Number of collections derived so far
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::FieldSchema;

    fn bug_schema() -> CollectionSchema {
        CollectionSchema::new()
            .with_field("name", FieldSchema::string())
            .with_field("points", FieldSchema::int())
            .with_field("done", FieldSchema::bool())
            .with_field("created_at", FieldSchema::datetime())
            .with_field("status", FieldSchema::enumeration(["open", "closed"]))
            .with_field("meta", FieldSchema::optional(SchemaNode::Other("json".into())))
    }

    #[test]
    fn test_kinds_and_operators() {
        let types = derive_field_types(&bug_schema());

        assert_eq!(types["points"].kind, FieldKind::Number);
        assert!(types["points"].allows(Operator::Gte));
        assert_eq!(types["done"].kind, FieldKind::Boolean);
        assert!(!types["done"].allows(Operator::In));
        assert_eq!(types["created_at"].kind, FieldKind::Date);
        assert!(!types["created_at"].allows(Operator::In));
        assert!(types["name"].allows(Operator::Contains));

        let status = &types["status"];
        assert_eq!(status.kind, FieldKind::Enum);
        assert!(status.enum_values.as_ref().unwrap().contains("open"));
    }

    #[test]
    fn test_unknown_node_defaults_to_string() {
        let types = derive_field_types(&bug_schema());
        assert_eq!(types["meta"], FieldTypeInfo::fallback("meta"));
        assert_eq!(
            types["meta"].allowed_operators.iter().copied().collect::<Vec<_>>(),
            vec![Operator::Equals, Operator::In]
        );
    }

    #[test]
    fn test_catalog_caches_first_derivation() {
        let catalog = FieldTypeCatalog::new();
        let first = catalog.types_for("bugs", &bug_schema());
        // A different schema under the same name does not replace the entry
        let second = catalog.types_for("bugs", &CollectionSchema::new());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(catalog.len(), 1);
    }
}
