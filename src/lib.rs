//! pagewise - an adaptive paginated query engine for PostgreSQL collections
//!
//! Turns a loosely-typed query descriptor (page, page size, search, ordering
//! and arbitrary filter keys) into a safe, paginated result:
//!
//! - filters are coerced and validated against the collection schema, and
//!   dropped as a whole when any of them is invalid
//! - search uses the full-text column when the table has one and falls back
//!   to ranked substring matching otherwise
//! - totals are counted exactly, sampled, read from planner statistics or
//!   skipped, depending on table size and page depth
//! - count and fetch run in one bounded transaction, or in parallel
//!
//! ```ignore
//! let paginator = Paginator::new(store, registry, EngineConfig::default());
//! let descriptor = QueryDescriptor::from_pairs([("page", "2"), ("status", "open")])?;
//! let page = paginator.paginate(&descriptor, "bugs", &Principal::anonymous()).await?;
//! ```

pub mod cli;
pub mod config;
pub mod count;
pub mod filter;
pub mod hydrate;
pub mod observability;
pub mod paginate;
pub mod predicate;
pub mod registry;
pub mod schema;
pub mod search;
pub mod sql;
pub mod store;
pub mod visibility;

pub use config::EngineConfig;
pub use paginate::{ExecutionMode, PageResult, PaginateError, PaginateResult, Paginator, QueryDescriptor};
pub use registry::{CollectionHandle, CollectionRegistry};
pub use visibility::Principal;
