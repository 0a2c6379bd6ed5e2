//! CLI command implementations
//!
//! Both commands read one request from stdin:
//!
//! ```json
//! {"collection": "bugs", "params": {"page": 2, "status": "open"}, "principal": {"user_id": "..."}}
//! ```
//!
//! `query` writes the page; `explain` writes the resolved plan and never
//! reads rows.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::observability::init_logging;
use crate::paginate::{ExecutionMode, Paginator, QueryDescriptor};
use crate::registry::{CollectionHandle, CollectionRegistry};
use crate::store::{PgStore, Store};
use crate::visibility::{OwnershipVisibility, Principal, Unrestricted, VisibilityPolicy, VisibilityProvider};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// PostgreSQL connection string (required)
    pub database_url: String,

    /// Pool size (default: 5)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub collections: Vec<CollectionHandle>,

    /// Visibility scoping; absent means every row is visible
    #[serde(default)]
    pub visibility: Option<VisibilityConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisibilityConfig {
    #[serde(default)]
    pub default_policy: VisibilityPolicy,

    #[serde(default)]
    pub policies: HashMap<String, VisibilityPolicy>,
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    /// Load configuration from file, then apply `PAGEWISE_*` overrides
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CliResult<Self> {
        let mut config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.engine = config.engine.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.database_url.trim().is_empty() {
            return Err(CliError::config_error("database_url must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(CliError::config_error("max_connections must be > 0"));
        }
        Ok(())
    }

    pub fn registry(&self) -> CliResult<CollectionRegistry> {
        let mut registry = CollectionRegistry::new();
        for handle in &self.collections {
            registry.register(handle.clone())?;
        }
        Ok(registry)
    }

    pub fn visibility_provider(&self) -> Arc<dyn VisibilityProvider> {
        match &self.visibility {
            None => Arc::new(Unrestricted),
            Some(cfg) => {
                let provider = cfg
                    .policies
                    .iter()
                    .fold(OwnershipVisibility::new().with_default_policy(cfg.default_policy.clone()), |p, (name, policy)| {
                        p.with_policy(name.as_str(), policy.clone())
                    });
                Arc::new(provider)
            }
        }
    }

    /// Engine over `store`
    pub fn paginator(&self, store: Arc<dyn Store>, mode: ExecutionMode) -> CliResult<Paginator> {
        Ok(Paginator::new(store, Arc::new(self.registry()?), self.engine.clone())
            .with_visibility(self.visibility_provider())
            .with_execution_mode(mode))
    }
}

/// One stdin request
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub collection: String,

    #[serde(default = "empty_params")]
    pub params: Value,

    #[serde(default)]
    pub principal: Principal,
}

fn empty_params() -> Value {
    json!({})
}

impl Request {
    pub fn from_value(value: Value) -> CliResult<Self> {
        serde_json::from_value(value).map_err(|e| CliError::bad_request(format!("Invalid request: {}", e)))
    }

    pub fn descriptor(&self) -> CliResult<QueryDescriptor> {
        Ok(QueryDescriptor::from_json(&self.params)?)
    }
}

/// Parse arguments, run, and report failures as an error response
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(cli.log_json);
    let result = run_command(cli.command);
    if let Err(err) = &result {
        write_error(err.code_str(), err.message())?;
    }
    result
}

/// Dispatch a command
pub fn run_command(cmd: Command) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::io_error(format!("Failed to start runtime: {}", e)))?;

    match cmd {
        Command::Query { config, parallel } => runtime.block_on(query(&config, parallel)),
        Command::Explain { config } => runtime.block_on(explain(&config)),
    }
}

/// Fetch one page and exit
pub async fn query(config_path: &Path, parallel: bool) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let request = Request::from_value(read_request()?)?;
    let store = connect(&config).await?;
    let mode = if parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Transactional
    };
    let data = execute_query(&config, store, mode, &request).await?;
    write_response(data)
}

/// Print the plan for a request and exit
pub async fn explain(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let request = Request::from_value(read_request()?)?;
    let store = connect(&config).await?;
    let data = execute_explain(&config, store, &request).await?;
    write_response(data)
}

pub async fn execute_query(
    config: &Config,
    store: Arc<dyn Store>,
    mode: ExecutionMode,
    request: &Request,
) -> CliResult<Value> {
    let paginator = config.paginator(store, mode)?;
    let page = paginator
        .paginate(&request.descriptor()?, &request.collection, &request.principal)
        .await?;
    Ok(serde_json::to_value(page)?)
}

pub async fn execute_explain(config: &Config, store: Arc<dyn Store>, request: &Request) -> CliResult<Value> {
    let paginator = config.paginator(store, ExecutionMode::Transactional)?;
    let plan = paginator
        .plan(&request.descriptor()?, &request.collection, &request.principal)
        .await?;
    let count_sql = plan.count_sql();
    Ok(json!({
        "plan": serde_json::to_value(&plan)?,
        "countSql": count_sql,
    }))
}

async fn connect(config: &Config) -> CliResult<Arc<dyn Store>> {
    let store = PgStore::connect(&config.database_url, config.max_connections, config.engine.tx_max_wait())
        .await?
        .with_slow_statement_threshold(config.engine.slow_query_threshold().max(Duration::from_millis(1)));
    Ok(Arc::new(store))
}
