//! Stepwise - plan / execute / review agent loop
//!
//! CLI entry point for running sessions and inspecting the sandbox.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use memstore::MemoryStore;
use stepwise::cli::{Cli, Command, get_log_path, resolve_root};
use stepwise::config::Config;
use stepwise::controller::{Controller, SessionReport};
use stepwise::llm::create_client;
use stepwise::prompts::PromptLoader;
use stepwise::sandbox::CommandRunner;
use stepwise::session::SessionState;
use stepwise::tools::{ToolContext, ToolRegistry};

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    let level = match cli_log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            goal,
            root,
            max_iters,
            allow_network,
        } => {
            let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
            cmd_run(config, &goal, root.as_ref(), max_iters, allow_network).await
        }
        Command::Check { command, root } => cmd_check(&command, root.as_ref()),
        Command::Tools => cmd_tools(),
    }
}

/// Run one session to a terminal state
async fn cmd_run(
    mut config: Config,
    goal: &str,
    root: Option<&PathBuf>,
    max_iters: Option<u32>,
    allow_network: bool,
) -> Result<()> {
    debug!(%goal, ?root, ?max_iters, allow_network, "cmd_run: called");
    if let Some(max_iters) = max_iters {
        config.session.max_iters = max_iters;
    }
    config.validate()?;

    let root = resolve_root(root)?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;

    let runner =
        CommandRunner::from_config(&root, &config.sandbox).with_network(allow_network || config.sandbox.allow_network);
    let memory = Arc::new(MemoryStore::open(&root));
    let ctx = ToolContext::new(runner, memory);
    let registry = Arc::new(ToolRegistry::standard());
    let controller = Controller::new(llm, registry, PromptLoader::new(&root), &config.session);

    let mut state = SessionState::new(goal, &root, config.session.max_iters, config.pruning.clone());
    println!("Working root: {}", root.display());
    println!("Goal: {}", goal);

    let report = controller.run(&mut state, &ctx).await?;
    print_report(&report);

    if !report.is_finished() {
        std::process::exit(2);
    }
    Ok(())
}

fn print_report(report: &SessionReport) {
    println!();
    for visit in &report.trace {
        println!("  {}", visit);
    }
    println!();
    println!("{}", report.outcome);
    println!(
        "Iterations: {} | Tokens: {} in / {} out",
        report.iters, report.usage.input_tokens, report.usage.output_tokens
    );
}

/// Validate a command against the sandbox policy
fn cmd_check(command: &str, root: Option<&PathBuf>) -> Result<()> {
    debug!(%command, ?root, "cmd_check: called");
    let root = resolve_root(root)?;
    let runner = CommandRunner::new(&root);

    match runner.check(command, &root) {
        Ok(()) => {
            println!("ALLOWED: {}", command);
            Ok(())
        }
        Err(blocked) => {
            info!(%command, reason = %blocked.reason, "cmd_check: blocked");
            eprintln!("BLOCKED: {}", blocked.reason);
            std::process::exit(1);
        }
    }
}

/// Print every registered tool with the first line of its description
fn cmd_tools() -> Result<()> {
    debug!("cmd_tools: called");
    let registry = ToolRegistry::standard();
    for definition in registry.definitions() {
        let summary = definition.description.lines().next().unwrap_or_default();
        println!("{:<16} {}", definition.name, summary);
    }
    Ok(())
}
