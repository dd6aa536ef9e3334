//! Replay a recorded host event stream through the reconciler

use anyhow::{Context, Result};
use colored::Colorize;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use state_lib::ingest::EnvelopeKind;
use state_lib::{AppState, Ingestor, StateStore, StoreConfig, StructuredLogger};
use std::path::Path;
use tabled::Tabled;
use tracing::debug;

use crate::output::{
    color_status, format_amount, format_bool, format_bytes, format_percent, print_json,
    print_table, print_warning, OutputFormat,
};

/// Counts collected while replaying a stream
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub envelopes: usize,
    pub snapshots: usize,
    pub deltas: usize,
    /// Malformed or unrecognized envelopes
    pub discarded: usize,
    /// Operations that mutated state
    pub applied: usize,
    /// Operations received but not applied
    pub skipped: usize,
}

#[derive(Serialize)]
struct ReplayOutput<'a> {
    summary: &'a ReplaySummary,
    state: &'a AppState,
}

/// Row for the containers table
#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Container")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Progress")]
    progress: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Logs")]
    logs: usize,
}

/// Feed every non-empty line of `content` to the ingestor, in order
pub fn replay_lines(ingestor: &Ingestor, content: &str) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let report = ingestor.handle_message(line);
        debug!(line = number + 1, kind = report.kind.label(), "Replayed envelope");

        summary.envelopes += 1;
        summary.applied += report.applied;
        summary.skipped += report.skipped;
        match report.kind {
            EnvelopeKind::State => summary.snapshots += 1,
            EnvelopeKind::Delta => summary.deltas += 1,
            EnvelopeKind::Unrecognized | EnvelopeKind::Malformed => summary.discarded += 1,
        }
    }

    summary
}

/// Replay `path` and print the resulting state
pub async fn replay(
    path: &Path,
    log_tail_capacity: usize,
    show_metrics: bool,
    format: OutputFormat,
) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let store = StateStore::new(StoreConfig { log_tail_capacity });
    let ingestor = Ingestor::new(store.clone(), StructuredLogger::new(path.display().to_string()));

    let summary = replay_lines(&ingestor, &content);
    let state = store.current();

    match format {
        OutputFormat::Json => print_json(&ReplayOutput {
            summary: &summary,
            state: &state,
        })?,
        OutputFormat::Table => print_state(&summary, &state),
    }

    if show_metrics {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        println!();
        println!("{}", String::from_utf8_lossy(&buffer));
    }

    Ok(())
}

fn print_state(summary: &ReplaySummary, state: &AppState) {
    println!("{}", "Replay Summary".bold());
    println!("{}", "=".repeat(60));
    println!(
        "Envelopes: {} ({} state, {} delta, {} discarded)",
        summary.envelopes, summary.snapshots, summary.deltas, summary.discarded
    );
    println!(
        "Operations: {} applied, {} skipped",
        summary.applied.to_string().green(),
        summary.skipped.to_string().yellow()
    );
    println!();

    let config = &state.config;
    println!("{}", "Session".bold());
    println!("  Tor:        {}", format_bool(config.tor_active));
    println!("  Base layer: {}", format_bool(config.base_layer_active));
    println!("  Wallet:     {}", format_bool(config.wallet_active));
    println!("  SHA3:       {}", format_bool(config.sha3_layer_active));
    println!("  Merge:      {}", format_bool(config.merge_layer_active));
    println!("  Monitoring: {}", format_bool(config.monitoring_layer_active));
    if let Some(settings) = &config.settings {
        println!("  Network:    {}", settings.tari_network.cyan());
    }
    println!();

    let rows: Vec<ContainerRow> = state
        .containers()
        .map(|record| ContainerRow {
            name: record.id.display_name().to_string(),
            status: color_status(&record.status),
            progress: record
                .progress()
                .map(|p| format!("{}% {}", p.pct, p.stage).trim_end().to_string())
                .unwrap_or_else(|| "-".to_string()),
            cpu: format_percent(record.usage.as_ref().and_then(|u| u.cpu_percent)),
            memory: record
                .usage
                .as_ref()
                .map(|u| {
                    format!(
                        "{} / {}",
                        format_bytes(u.sample.mem_usage),
                        format_bytes(u.sample.mem_limit)
                    )
                })
                .unwrap_or_else(|| "-".to_string()),
            enabled: format_bool(config.is_enabled(record.id)),
            logs: record.logs.len(),
        })
        .collect();
    print_table(rows);

    for record in state.containers() {
        if let Some(error) = &record.last_error {
            print_warning(&format!("{}: {}", record.id.display_name(), error));
        }
    }

    println!();
    println!("{}", "Wallet".bold());
    println!("  Active:       {}", format_bool(state.wallet.active));
    if let Some(balance) = &state.wallet.balance {
        println!("  Available:    {}", format_amount(balance.available));
        println!("  Incoming:     {}", format_amount(balance.pending_incoming));
        println!("  Outgoing:     {}", format_amount(balance.pending_outgoing));
    }
    println!("  Transactions: {}", state.wallet.transactions.len());
}
