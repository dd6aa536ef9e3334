//! Launchpad monitor
//!
//! Bridges a launchpad host to the canonical state: host envelopes arrive as
//! JSON lines on stdin (or a file), actions leave as JSON lines on stdout, and
//! the reconciled state is served over HTTP.

use anyhow::{Context, Result};
use state_lib::{Action, AdapterConfig, EventAdapter, HostBus, StateStore, StoreConfig};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod feed;

use config::{LogFormat, MonitorConfig};

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries actions, so logs go to stderr
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = MonitorConfig::load()?;
    init_tracing(config.log_format);

    info!(version = MONITOR_VERSION, "Starting launchpad-monitor");
    info!(
        reaction_channel = %config.reaction_channel,
        action_channel = %config.action_channel,
        api_port = config.api_port,
        "Monitor configured"
    );

    let store = StateStore::new(StoreConfig {
        log_tail_capacity: config.log_tail_capacity,
    });
    let bus = HostBus::new(config.channel_capacity);

    // Actions subscriber first so nothing sent during startup is lost
    let actions_rx = bus.subscribe(&config.action_channel);
    let actions_handle = tokio::spawn(feed::forward_actions(actions_rx, tokio::io::stdout()));

    let adapter = EventAdapter::new(
        AdapterConfig {
            channel: config.reaction_channel.clone(),
            resync_channel: Some(config.action_channel.clone()),
        },
        store.clone(),
    );
    let mut subscription = adapter.subscribe(&bus);

    let api_state = Arc::new(api::ApiState::new(
        store.clone(),
        subscription.status(),
        bus.clone(),
        config.action_channel.clone(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, api_state));

    if config.connect_on_start {
        bus.send_action(&config.action_channel, Action::Connect)
            .context("Failed to send Connect action")?;
    }

    let pump_handle = match &config.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            info!(input = %path.display(), "Reading host events from file");
            tokio::spawn(feed::pump(
                BufReader::new(file),
                bus.clone(),
                config.reaction_channel.clone(),
            ))
        }
        None => {
            info!("Reading host events from stdin");
            tokio::spawn(feed::pump(
                BufReader::new(tokio::io::stdin()),
                bus.clone(),
                config.reaction_channel.clone(),
            ))
        }
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server stopped"),
                Err(e) => error!(error = %e, "API server task failed"),
                Ok(Ok(())) => warn!("API server exited"),
            }
        }
    }

    pump_handle.abort();
    subscription.unsubscribe();
    actions_handle.abort();

    let active = store.read(|s| s.active_count());
    info!(active_containers = active, "Shutting down");

    Ok(())
}
