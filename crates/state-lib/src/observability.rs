//! Observability for the state synchronization core
//!
//! Provides:
//! - Prometheus metrics (envelopes ingested, mutations applied, skips, per-container CPU)
//! - Structured logging of reconciliation events with tracing

use prometheus::{
    register_gauge_vec, register_int_counter_vec, register_int_gauge, GaugeVec, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::containers::ContainerId;
use crate::status::TaskStatus;

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SyncMetricsInner> = OnceLock::new();

struct SyncMetricsInner {
    envelopes_total: IntCounterVec,
    mutations_total: IntCounterVec,
    skipped_total: IntCounterVec,
    container_cpu_percent: GaugeVec,
    containers_active: IntGauge,
}

impl SyncMetricsInner {
    fn new() -> Self {
        Self {
            envelopes_total: register_int_counter_vec!(
                "launchpad_state_envelopes_total",
                "Envelopes received on the reaction channel, by classification",
                &["kind"]
            )
            .expect("Failed to register envelopes_total"),

            mutations_total: register_int_counter_vec!(
                "launchpad_state_mutations_total",
                "Reconciler operations that changed canonical state",
                &["op"]
            )
            .expect("Failed to register mutations_total"),

            skipped_total: register_int_counter_vec!(
                "launchpad_state_skipped_total",
                "Updates that were received but not applied",
                &["reason"]
            )
            .expect("Failed to register skipped_total"),

            container_cpu_percent: register_gauge_vec!(
                "launchpad_state_container_cpu_percent",
                "Most recent derived CPU utilisation per container",
                &["container"]
            )
            .expect("Failed to register container_cpu_percent"),

            containers_active: register_int_gauge!(
                "launchpad_state_containers_active",
                "Number of containers currently reported Active"
            )
            .expect("Failed to register containers_active"),
        }
    }
}

/// Handle to the process-wide sync metrics
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct SyncMetrics {
    _private: (),
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SyncMetricsInner {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new)
    }

    /// Count one envelope of the given kind (state, delta, unrecognized, malformed)
    pub fn inc_envelope(&self, kind: &str) {
        self.inner().envelopes_total.with_label_values(&[kind]).inc();
    }

    pub fn inc_mutation(&self, op: &str) {
        self.inner().mutations_total.with_label_values(&[op]).inc();
    }

    pub fn inc_skipped(&self, reason: &str) {
        self.inner().skipped_total.with_label_values(&[reason]).inc();
    }

    pub fn set_cpu_percent(&self, id: ContainerId, percent: f64) {
        self.inner()
            .container_cpu_percent
            .with_label_values(&[id.token()])
            .set(percent);
    }

    pub fn set_containers_active(&self, count: i64) {
        self.inner().containers_active.set(count);
    }

    #[cfg(test)]
    fn mutation_count(&self, op: &str) -> u64 {
        self.inner().mutations_total.with_label_values(&[op]).get()
    }
}

/// Structured logger for reconciliation events
///
/// Every record carries the channel it came from so several adapters can
/// share one log stream.
#[derive(Clone)]
pub struct StructuredLogger {
    channel: String,
}

impl StructuredLogger {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    pub fn log_subscribed(&self) {
        info!(
            event = "adapter_subscribed",
            channel = %self.channel,
            "Subscribed to host event channel"
        );
    }

    pub fn log_unsubscribed(&self, reason: &str) {
        info!(
            event = "adapter_unsubscribed",
            channel = %self.channel,
            reason = %reason,
            "Unsubscribed from host event channel"
        );
    }

    pub fn log_snapshot(&self, applied: usize, unknown: &[String], rejected: usize) {
        if unknown.is_empty() && rejected == 0 {
            info!(
                event = "snapshot_applied",
                channel = %self.channel,
                containers = applied,
                "Applied full state snapshot"
            );
        } else {
            warn!(
                event = "snapshot_applied",
                channel = %self.channel,
                containers = applied,
                unknown = ?unknown,
                rejected = rejected,
                "Applied full state snapshot with skipped entries"
            );
        }
    }

    pub fn log_status_transition(&self, id: ContainerId, from: &TaskStatus, to: &TaskStatus) {
        match to {
            TaskStatus::Failed(reason) => {
                warn!(
                    event = "status_changed",
                    channel = %self.channel,
                    container = %id,
                    from = from.label(),
                    to = to.label(),
                    error = %reason,
                    "Container failed"
                );
            }
            _ => {
                info!(
                    event = "status_changed",
                    channel = %self.channel,
                    container = %id,
                    from = from.label(),
                    to = to.label(),
                    "Container status changed"
                );
            }
        }
    }

    pub fn log_unknown_container(&self, name: &str, op: &str) {
        warn!(
            event = "unknown_container",
            channel = %self.channel,
            container = %name,
            op = %op,
            "Ignoring delta for unknown container"
        );
    }

    pub fn log_discarded(&self, reason: &str, details: &str) {
        warn!(
            event = "envelope_discarded",
            channel = %self.channel,
            reason = %reason,
            details = %details,
            "Discarding envelope"
        );
    }

    pub fn log_unknown_delta(&self, keys: &[String]) {
        debug!(
            event = "unknown_delta",
            channel = %self.channel,
            keys = ?keys,
            "Delta carried no recognised update"
        );
    }

    pub fn log_lagged(&self, skipped: u64) {
        warn!(
            event = "adapter_lagged",
            channel = %self.channel,
            skipped = skipped,
            "Adapter fell behind the channel, messages were dropped"
        );
    }

    pub fn log_resync_requested(&self, action_channel: &str, delivered: usize) {
        info!(
            event = "resync_requested",
            channel = %self.channel,
            action_channel = %action_channel,
            delivered = delivered,
            "Requested a fresh snapshot from the host"
        );
    }
}
