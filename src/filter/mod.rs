//! # Filters
//!
//! Untyped filter input (`FilterValue`), its validated typed form
//! (`FilterCondition`) and the builder between the two.

mod builder;
mod condition;
mod value;

pub use builder::FilterConditionBuilder;
pub use condition::{to_predicate, ConditionKind, FilterCondition};
pub use value::{ConditionArg, FilterValue, RawScalar, CONDITION_OPERATORS};
