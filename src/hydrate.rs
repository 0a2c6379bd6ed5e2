//! Row hydration
//!
//! A hydrator enriches fetched rows with detail data after the page is read.
//! It runs outside the transaction. A failure keeps the rows as they were.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Hydration failed: {0}")]
pub struct HydrateError(pub String);

impl HydrateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type HydrateFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Value>, HydrateError>> + Send + 'a>>;

/// Enriches the rows of one page
pub trait Hydrator: Send + Sync {
    /// Return the enriched rows, in the same order
    fn hydrate<'a>(&'a self, collection: &'a str, rows: Vec<Value>) -> HydrateFuture<'a>;
}

/// Returns rows unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHydrator;

impl Hydrator for NoopHydrator {
    fn hydrate<'a>(&'a self, _collection: &'a str, rows: Vec<Value>) -> HydrateFuture<'a> {
        Box::pin(async move { Ok(rows) })
    }
}

type HydrateFn = dyn Fn(&str, Vec<Value>) -> Result<Vec<Value>, HydrateError> + Send + Sync;

/// Hydrator over a synchronous closure
#[derive(Clone)]
pub struct FnHydrator {
    f: Arc<HydrateFn>,
}

impl FnHydrator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, Vec<Value>) -> Result<Vec<Value>, HydrateError> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

impl std::fmt::Debug for FnHydrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHydrator").finish_non_exhaustive()
    }
}

impl Hydrator for FnHydrator {
    fn hydrate<'a>(&'a self, collection: &'a str, rows: Vec<Value>) -> HydrateFuture<'a> {
        let result = (self.f)(collection, rows);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_keeps_rows() {
        let rows = vec![json!({"id": 1})];
        assert_eq!(NoopHydrator.hydrate("bugs", rows.clone()).await.unwrap(), rows);
    }

    #[tokio::test]
    async fn test_fn_hydrator() {
        let hydrator = FnHydrator::new(|collection, mut rows| {
            for row in rows.iter_mut() {
                if let Some(obj) = row.as_object_mut() {
                    obj.insert("collection".into(), json!(collection));
                }
            }
            Ok(rows)
        });
        let out = hydrator.hydrate("bugs", vec![json!({"id": 1})]).await.unwrap();
        assert_eq!(out, vec![json!({"id": 1, "collection": "bugs"})]);

        let failing = FnHydrator::new(|_, _| Err(HydrateError::new("detail service down")));
        let err = failing.hydrate("bugs", vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "Hydration failed: detail service down");
    }
}
