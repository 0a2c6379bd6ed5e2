//! CLI module for pagewise
//!
//! Provides command-line interface for:
//! - query: fetch one page
//! - explain: print the resolved plan

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{execute_explain, execute_query, explain, query, run, run_command, Config, Request, VisibilityConfig};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
