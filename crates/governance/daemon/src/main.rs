//! governd - governance runtime front end
//!
//! - `check`: validate a policy forest and print its governing roots
//! - `replay`: run a JSON-lines event log through the runtime against an
//!   in-memory platform and print every decision and merge

use anyhow::Context;
use clap::{Parser, Subcommand};
use governance_daemon::{load_events, load_forest, replay, summarize};
use governance_runtime::{InMemoryPlatform, RuntimeConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Governance daemon CLI
#[derive(Parser)]
#[command(name = "governd")]
#[command(about = "Collaborative-decision governance runtime", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GOVERN_CONFIG", global = true)]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "GOVERN_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "GOVERN_LOG_JSON", global = true)]
    json: bool,

    /// Timeout for each platform call, in milliseconds
    #[arg(long, global = true)]
    check_timeout_ms: Option<u64>,

    /// Fire every deadline this many seconds after it opens
    #[arg(long, global = true)]
    test_offset_secs: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a policy forest
    Check {
        /// Policy forest (JSON)
        #[arg(short, long)]
        policies: PathBuf,
    },
    /// Replay an event log
    Replay {
        /// Policy forest (JSON)
        #[arg(short, long)]
        policies: PathBuf,

        /// Events, one JSON object per line
        #[arg(short, long)]
        events: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config =
        RuntimeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Override with CLI args
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    if let Some(timeout_ms) = cli.check_timeout_ms {
        config.checks.timeout_ms = timeout_ms;
    }
    if let Some(offset) = cli.test_offset_secs {
        config.deadlines.test_offset_secs = Some(offset);
    }

    // Initialize tracing; stdout carries results
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Command::Check { policies } => {
            let forest = load_forest(&policies)?;
            println!("{}", serde_json::to_string_pretty(&summarize(&forest))?);
        }
        Command::Replay { policies, events } => {
            let forest = load_forest(&policies)?;
            let events = load_events(&events)?;
            tracing::info!(
                policies = forest.len(),
                events = events.len(),
                "Replaying event log"
            );

            let report = replay(config, forest, events, Arc::new(InMemoryPlatform::new())).await?;
            for directive in &report.directives {
                println!("{}", serde_json::to_string(directive)?);
            }
            println!("{}", serde_json::to_string_pretty(&report.outcomes)?);
            tracing::info!(
                collaborations = report.outcomes.len(),
                accepted = report.accepted(),
                "Done"
            );
        }
    }

    Ok(())
}
