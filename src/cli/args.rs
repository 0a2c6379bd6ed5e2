//! CLI argument definitions using clap
//!
//! Commands:
//! - pagewise query --config <path>
//! - pagewise explain --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pagewise - adaptive paginated queries over PostgreSQL collections
#[derive(Parser, Debug)]
#[command(name = "pagewise")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one page for the request read from stdin
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./pagewise.json")]
        config: PathBuf,

        /// Run count and fetch concurrently on separate sessions
        #[arg(long)]
        parallel: bool,
    },

    /// Print the resolved plan for the request read from stdin
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = "./pagewise.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let cli = Cli::try_parse_from(["pagewise", "query", "--config", "x.json", "--parallel"]).unwrap();
        match cli.command {
            Command::Query { config, parallel } => {
                assert_eq!(config, PathBuf::from("x.json"));
                assert!(parallel);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(!cli.log_json);
    }

    #[test]
    fn test_parse_explain_default_config() {
        let cli = Cli::try_parse_from(["pagewise", "--log-json", "explain"]).unwrap();
        assert!(cli.log_json);
        assert!(matches!(cli.command, Command::Explain { config } if config == PathBuf::from("./pagewise.json")));
    }
}
