//! # Search
//!
//! Free-text search over a collection, either through an indexed search
//! column or as a ranked substring match across the searchable fields.

mod plan;
mod selector;

pub use plan::{split_terms, SearchPlan};
pub use selector::SearchStrategySelector;
