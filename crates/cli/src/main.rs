//! Launchpad state CLI
//!
//! Replays recorded host event streams through the reconciler, lists the
//! container identifiers and builds outbound action envelopes.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{action, containers, replay};
use state_lib::reconciler::DEFAULT_LOG_TAIL_CAPACITY;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Launchpad state CLI
#[derive(Parser)]
#[command(name = "lpstate")]
#[command(author, version, about = "Inspect and replay launchpad state streams", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/lpstate/config.json)
    #[arg(long, env = "LPSTATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (overrides the config file)
    #[arg(long, short, env = "LPSTATE_FORMAT")]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose logging on stderr
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a newline-delimited envelope file and print the resulting state
    Replay {
        /// File with one JSON envelope per line
        file: PathBuf,

        /// Print Prometheus metrics after the state
        #[arg(long)]
        metrics: bool,
    },

    /// List container tokens and display names
    Containers,

    /// Build an action envelope for the host
    #[command(subcommand)]
    Action(ActionCommands),
}

#[derive(Subcommand)]
pub enum ActionCommands {
    /// Ask the host to publish a full snapshot
    Connect,

    /// Replace the session configuration
    ChangeSession {
        /// Session configuration as JSON
        payload: String,
    },

    /// Persist settings
    SaveSettings {
        /// Persistent settings as JSON
        payload: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::Config::load(cli.config.as_deref())?;
    let format = cli.format.or(config.default_format).unwrap_or_default();

    match cli.command {
        Commands::Replay { file, metrics } => {
            let capacity = config.log_tail_capacity.unwrap_or(DEFAULT_LOG_TAIL_CAPACITY);
            replay::replay(&file, capacity, metrics, format).await?;
        }
        Commands::Containers => {
            containers::list_containers(format)?;
        }
        Commands::Action(action_cmd) => {
            let envelope = action::build(action_cmd)?;
            action::print_action(&envelope, format)?;
        }
    }

    Ok(())
}
