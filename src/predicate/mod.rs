//! # Predicates
//!
//! Typed predicate trees, ordering keys and their reference row semantics.

mod eval;
mod tree;
mod value;

pub use eval::{evaluate, matches, substring_rank, substring_relevance, text_rank, tokenize};
pub use tree::{CompareOp, Comparison, OrderKey, Predicate, SortDirection};
pub use value::{parse_timestamp, SqlValue};
