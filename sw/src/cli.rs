//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::{Context, Result, eyre};
use tracing::debug;

/// Stepwise - plan / execute / review agent loop
#[derive(Parser)]
#[command(
    name = "sw",
    about = "Plan, execute and review a coding goal inside a sandboxed working root",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a session for a goal and print the report
    Run {
        /// What the agent should accomplish
        goal: String,

        /// Working root (defaults to the current directory)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Iteration ceiling (overrides session.max-iters)
        #[arg(short, long)]
        max_iters: Option<u32>,

        /// Let commands reach the network
        #[arg(long)]
        allow_network: bool,
    },

    /// Check a command against the sandbox policy without running it
    Check {
        /// Shell command to validate
        command: String,

        /// Working root (defaults to the current directory)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// List the executor's tools
    Tools,
}

/// Canonical working root, defaulting to the current directory
pub fn resolve_root(root: Option<&PathBuf>) -> Result<PathBuf> {
    debug!(?root, "resolve_root: called");
    let root = match root {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    if !root.is_dir() {
        return Err(eyre!("Working root is not a directory: {}", root.display()));
    }
    root.canonicalize()
        .context(format!("Failed to resolve working root {}", root.display()))
}

/// Log file location: `<data_local_dir>/stepwise/logs/stepwise.log`
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stepwise")
        .join("logs")
        .join("stepwise.log")
}
