//! # Pagination
//!
//! Descriptor in, page envelope out. See `engine` for the orchestration.

mod descriptor;
mod engine;
mod errors;
mod ordering;
mod plan;
mod result;

pub use descriptor::QueryDescriptor;
pub use engine::{ExecutionMode, Paginator};
pub use errors::{ErrorResponse, PaginateError, PaginateResult};
pub use ordering::{parse_ordering, resolve_ordering};
pub use plan::QueryPlan;
pub use result::{page_count, PageResult};
