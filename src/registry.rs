//! # Collection Registry
//!
//! Collections are resolved by name once per request from a registry built
//! at startup. A handle carries everything the engine needs about its
//! collection: table, schema and the allow-lists for filtering, search and
//! ordering.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::count::CountMode;
use crate::schema::{CollectionSchema, SchemaError, SchemaResult};

/// A collection exposed through the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionHandle {
    pub name: String,

    /// Table name, optionally schema-qualified
    pub table: String,

    #[serde(default)]
    pub schema: CollectionSchema,

    /// Primary key used as ordering tie-break (default: "id")
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    #[serde(default)]
    pub filterable_fields: Vec<String>,

    #[serde(default)]
    pub searchable_fields: Vec<String>,

    #[serde(default)]
    pub orderable_fields: Vec<String>,

    /// Ordering used when none (or an unknown one) is requested
    #[serde(default = "default_ordering")]
    pub default_ordering: String,

    /// Full-text search column; used only if the table has it
    #[serde(default = "default_search_column")]
    pub search_column: String,

    /// Rows with a non-null value here are never returned
    #[serde(default)]
    pub soft_delete_column: Option<String>,

    #[serde(default)]
    pub count_mode: CountMode,
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_ordering() -> String {
    "-created_at".to_string()
}

fn default_search_column() -> String {
    "search_vector".to_string()
}

impl CollectionHandle {
    pub fn new(name: impl Into<String>, table: impl Into<String>, schema: CollectionSchema) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            schema,
            primary_key: default_primary_key(),
            filterable_fields: Vec::new(),
            searchable_fields: Vec::new(),
            orderable_fields: Vec::new(),
            default_ordering: default_ordering(),
            search_column: default_search_column(),
            soft_delete_column: None,
            count_mode: CountMode::default(),
        }
    }

    pub fn filterable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filterable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn orderable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orderable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    pub fn count_mode(mut self, mode: CountMode) -> Self {
        self.count_mode = mode;
        self
    }

    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    pub fn default_ordering(mut self, ordering: impl Into<String>) -> Self {
        self.default_ordering = ordering.into();
        self
    }

    fn check(&self) -> SchemaResult<()> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::invalid(&self.name, "empty collection name"));
        }
        if self.table.trim().is_empty() {
            return Err(SchemaError::invalid(&self.name, "empty table name"));
        }
        if self.primary_key.trim().is_empty() {
            return Err(SchemaError::invalid(&self.name, "empty primary key"));
        }
        let default_field = self.default_ordering.trim_start_matches('-');
        if default_field.is_empty() {
            return Err(SchemaError::invalid(&self.name, "empty default ordering"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    collections: Vec<CollectionHandle>,
}

/// Name → collection, immutable after startup
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    collections: HashMap<String, Arc<CollectionHandle>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection. Names are unique.
    pub fn register(&mut self, handle: CollectionHandle) -> SchemaResult<()> {
        handle.check()?;
        if self.collections.contains_key(&handle.name) {
            return Err(SchemaError::DuplicateCollection(handle.name));
        }
        self.collections.insert(handle.name.clone(), Arc::new(handle));
        Ok(())
    }

    pub fn with(mut self, handle: CollectionHandle) -> SchemaResult<Self> {
        self.register(handle)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CollectionHandle>> {
        self.collections.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Build from `{"collections": [...]}`
    pub fn from_json(value: serde_json::Value) -> SchemaResult<Self> {
        let doc: RegistryDocument =
            serde_json::from_value(value).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        let mut registry = Self::new();
        for handle in doc.collections {
            registry.register(handle)?;
        }
        Ok(registry)
    }

    pub fn load(path: &Path) -> SchemaResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Malformed(format!("{}: {}", path.display(), e)))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| SchemaError::Malformed(format!("{}: {}", path.display(), e)))?;
        Self::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use serde_json::json;

    #[test]
    fn test_defaults_from_json() {
        let registry = CollectionRegistry::from_json(json!({
            "collections": [{
                "name": "bugs",
                "table": "app.bugs",
                "schema": {"fields": {"status": {"type": "enum", "values": ["open", "closed"]}}},
                "filterable_fields": ["status"],
                "soft_delete_column": "deleted_at",
                "count_mode": "estimate"
            }]
        }))
        .unwrap();

        let bugs = registry.get("bugs").unwrap();
        assert_eq!(bugs.primary_key, "id");
        assert_eq!(bugs.default_ordering, "-created_at");
        assert_eq!(bugs.search_column, "search_vector");
        assert_eq!(bugs.soft_delete_column.as_deref(), Some("deleted_at"));
        assert_eq!(bugs.count_mode, CountMode::Estimate);
        assert!(bugs.schema.field("status").is_some());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = CollectionRegistry::new();
        registry
            .register(CollectionHandle::new("bugs", "bugs", CollectionSchema::new()))
            .unwrap();
        let err = registry
            .register(CollectionHandle::new("bugs", "other", CollectionSchema::new()))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateCollection(name) if name == "bugs"));
    }

    #[test]
    fn test_invalid_handle_rejected() {
        let mut registry = CollectionRegistry::new();
        let err = registry
            .register(CollectionHandle::new("bugs", " ", CollectionSchema::new()))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidCollection { .. }));
    }

    #[test]
    fn test_malformed_document() {
        let err = CollectionRegistry::from_json(json!({"collections": [{"table": "x"}]})).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed(_)));
    }

    #[test]
    fn test_builders() {
        let handle = CollectionHandle::new("bugs", "bugs", CollectionSchema::new().with_field("title", FieldSchema::string()))
            .filterable(["title"])
            .searchable(["title"])
            .orderable(["title", "created_at"])
            .soft_delete("deleted_at");
        assert_eq!(handle.filterable_fields, vec!["title"]);
        assert_eq!(handle.orderable_fields.len(), 2);
        assert!(handle.soft_delete_column.is_some());
        let registry = CollectionRegistry::new().with(handle).unwrap();
        assert_eq!(registry.names(), vec!["bugs"]);
    }
}
