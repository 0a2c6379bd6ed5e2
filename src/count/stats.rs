//! Table statistics and count thresholds

use serde::{Deserialize, Serialize};

/// Planner statistics for one table.
///
/// Fetched outside any transaction and never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatsSnapshot {
    /// Estimated live tuples
    pub live_rows: u64,
    /// Dead tuples awaiting vacuum
    pub dead_rows: u64,
    /// Total relation size in bytes, including indexes and toast
    pub approx_bytes: u64,
}

impl TableStatsSnapshot {
    pub fn new(live_rows: u64, dead_rows: u64, approx_bytes: u64) -> Self {
        Self {
            live_rows,
            dead_rows,
            approx_bytes,
        }
    }
}

/// Count strategy thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountThresholds {
    /// Below this many live rows an exact count is always used (default: 10,000)
    #[serde(default = "default_small_table_rows")]
    pub small_table_rows: u64,

    /// Pages up to this depth always get an exact count (default: 5)
    #[serde(default = "default_exact_page_depth")]
    pub exact_page_depth: u32,

    /// A table above this size is large (default: 100MB)
    #[serde(default = "default_large_table_bytes")]
    pub large_table_bytes: u64,

    /// A table above this many live rows is large (default: 100,000)
    #[serde(default = "default_large_table_rows")]
    pub large_table_rows: u64,

    /// Upper bound on the sample size (default: 1000)
    #[serde(default = "default_sample_max")]
    pub sample_max: u64,

    /// Live rows per sampled row (default: 100)
    #[serde(default = "default_sample_divisor")]
    pub sample_divisor: u64,

    /// Fraction of live rows reported when a sample saturates (default: 0.8)
    #[serde(default = "default_saturation_ratio")]
    pub saturation_ratio: f64,

    /// Most AND branches a predicate may have for the raw count path (default: 3)
    #[serde(default = "default_max_simple_branches")]
    pub max_simple_branches: usize,
}

fn default_small_table_rows() -> u64 {
    10_000
}

fn default_exact_page_depth() -> u32 {
    5
}

fn default_large_table_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_large_table_rows() -> u64 {
    100_000
}

fn default_sample_max() -> u64 {
    1000
}

fn default_sample_divisor() -> u64 {
    100
}

fn default_saturation_ratio() -> f64 {
    0.8
}

fn default_max_simple_branches() -> usize {
    3
}

impl Default for CountThresholds {
    fn default() -> Self {
        Self {
            small_table_rows: default_small_table_rows(),
            exact_page_depth: default_exact_page_depth(),
            large_table_bytes: default_large_table_bytes(),
            large_table_rows: default_large_table_rows(),
            sample_max: default_sample_max(),
            sample_divisor: default_sample_divisor(),
            saturation_ratio: default_saturation_ratio(),
            max_simple_branches: default_max_simple_branches(),
        }
    }
}

impl CountThresholds {
    /// Whether the table is small enough to always count exactly
    pub fn is_small(&self, stats: &TableStatsSnapshot) -> bool {
        stats.live_rows < self.small_table_rows
    }

    /// Whether the table is large by size or by rows
    pub fn is_large(&self, stats: &TableStatsSnapshot) -> bool {
        stats.approx_bytes > self.large_table_bytes || stats.live_rows > self.large_table_rows
    }

    /// `min(sample_max, max(1, live_rows / sample_divisor))`
    pub fn sample_size(&self, live_rows: u64) -> u64 {
        (live_rows / self.sample_divisor.max(1)).max(1).min(self.sample_max)
    }

    /// Estimate reported when a sample saturates
    pub fn saturated_estimate(&self, live_rows: u64) -> u64 {
        (live_rows as f64 * self.saturation_ratio).floor() as u64
    }
}
