//! Monitor configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use state_lib::ingest::{ACTIONS_CHANNEL, DEFAULT_CHANNEL_CAPACITY, REACTIONS_CHANNEL};
use state_lib::reconciler::DEFAULT_LOG_TAIL_CAPACITY;
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Channel the host publishes state and deltas on
    #[serde(default = "default_reaction_channel")]
    pub reaction_channel: String,

    /// Channel actions are published on
    #[serde(default = "default_action_channel")]
    pub action_channel: String,

    /// HTTP port for the state, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Log lines kept per container
    #[serde(default = "default_log_tail_capacity")]
    pub log_tail_capacity: usize,

    /// Per-channel buffer of the in-process bus
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Read events from this file instead of stdin
    #[serde(default)]
    pub input: Option<PathBuf>,

    /// Send a Connect action once subscribed
    #[serde(default = "default_connect_on_start")]
    pub connect_on_start: bool,
}

fn default_reaction_channel() -> String {
    REACTIONS_CHANNEL.to_string()
}

fn default_action_channel() -> String {
    ACTIONS_CHANNEL.to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_log_tail_capacity() -> usize {
    DEFAULT_LOG_TAIL_CAPACITY
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_connect_on_start() -> bool {
    true
}

impl MonitorConfig {
    /// Load configuration from `launchpad-monitor.{toml,json,yaml}` (optional)
    /// and `MONITOR_*` environment variables
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("launchpad-monitor").required(false))
            .add_source(config::Environment::with_prefix("MONITOR").try_parsing(true));

        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .build()
            .context("Failed to read monitor configuration")?
            .try_deserialize()
            .context("Invalid monitor configuration")
    }
}
