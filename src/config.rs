//! Engine Configuration
//!
//! Timeouts, page-size limits and count thresholds. Loaded from a JSON file
//! (every field optional) and overridden by `PAGEWISE_*` environment
//! variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::count::CountThresholds;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bound on session acquisition in ms (default: 2000)
    #[serde(default = "default_tx_max_wait_ms")]
    pub tx_max_wait_ms: u64,

    /// Bound on the count/fetch body in ms (default: 10000)
    #[serde(default = "default_tx_timeout_ms")]
    pub tx_timeout_ms: u64,

    /// Page size when none is given (default: 10)
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,

    /// Largest accepted page size (default: 100)
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,

    /// Requests slower than this are logged at warn (default: 500)
    #[serde(default = "default_slow_query_ms")]
    pub slow_query_ms: u64,

    #[serde(default)]
    pub count: CountThresholds,
}

fn default_tx_max_wait_ms() -> u64 {
    2_000
}

fn default_tx_timeout_ms() -> u64 {
    10_000
}

fn default_per_page() -> u32 {
    10
}

fn default_max_per_page() -> u32 {
    100
}

fn default_slow_query_ms() -> u64 {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tx_max_wait_ms: default_tx_max_wait_ms(),
            tx_timeout_ms: default_tx_timeout_ms(),
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            slow_query_ms: default_slow_query_ms(),
            count: CountThresholds::default(),
        }
    }
}

const ENV_TX_MAX_WAIT: &str = "PAGEWISE_TX_MAX_WAIT_MS";
const ENV_TX_TIMEOUT: &str = "PAGEWISE_TX_TIMEOUT_MS";
const ENV_DEFAULT_PER_PAGE: &str = "PAGEWISE_DEFAULT_PER_PAGE";
const ENV_MAX_PER_PAGE: &str = "PAGEWISE_MAX_PER_PAGE";
const ENV_SLOW_QUERY: &str = "PAGEWISE_SLOW_QUERY_MS";

impl EngineConfig {
    /// Load from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.apply_env(|var| std::env::var(var).ok())
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`, then validate
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, ENV_TX_MAX_WAIT)? {
            self.tx_max_wait_ms = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_TX_TIMEOUT)? {
            self.tx_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_DEFAULT_PER_PAGE)? {
            self.default_per_page = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_PER_PAGE)? {
            self.max_per_page = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_SLOW_QUERY)? {
            self.slow_query_ms = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_per_page == 0 {
            return Err(ConfigError::Invalid("max_per_page must be at least 1".into()));
        }
        if self.default_per_page == 0 || self.default_per_page > self.max_per_page {
            return Err(ConfigError::Invalid(format!(
                "default_per_page must be within 1..={}",
                self.max_per_page
            )));
        }
        if self.count.sample_divisor == 0 {
            return Err(ConfigError::Invalid("count.sample_divisor must be at least 1".into()));
        }
        Ok(())
    }

    pub fn tx_max_wait(&self) -> Duration {
        Duration::from_millis(self.tx_max_wait_ms)
    }

    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_timeout_ms)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_ms)
    }
}

fn parse_var<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tx_max_wait(), Duration::from_secs(2));
        assert_eq!(config.tx_timeout(), Duration::from_secs(10));
        assert_eq!(config.default_per_page, 10);
        assert_eq!(config.max_per_page, 100);
        assert_eq!(config.slow_query_threshold(), Duration::from_millis(500));
        assert_eq!(config.count.small_table_rows, 10_000);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::default()
            .apply_env(env(&[(ENV_TX_TIMEOUT, "250"), (ENV_MAX_PER_PAGE, " 50 ")]))
            .unwrap();
        assert_eq!(config.tx_timeout_ms, 250);
        assert_eq!(config.max_per_page, 50);
        assert_eq!(config.tx_max_wait_ms, 2_000);
    }

    #[test]
    fn test_env_invalid_value() {
        let err = EngineConfig::default()
            .apply_env(env(&[(ENV_SLOW_QUERY, "fast")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == ENV_SLOW_QUERY));
    }

    #[test]
    fn test_default_per_page_above_max_rejected() {
        let err = EngineConfig::default()
            .apply_env(env(&[(ENV_DEFAULT_PER_PAGE, "500")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_per_page": 25, "count": {{"exact_page_depth": 2}}}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_per_page, 25);
        assert_eq!(config.count.exact_page_depth, 2);
        assert_eq!(config.count.sample_max, 1000);
        assert_eq!(config.default_per_page, 10);
    }
}
