//! # Counting
//!
//! Adaptive total counting: a selector decides between skipping, exact,
//! sampled and statistics-based counts; the executor runs the decision with
//! fallbacks.

mod executor;
mod stats;
mod strategy;

pub use executor::{CountExecutor, CountOutcome};
pub use stats::{CountThresholds, TableStatsSnapshot};
pub use strategy::{CountMode, CountPlan, CountRequest, CountStrategySelector};
