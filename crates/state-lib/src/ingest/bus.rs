//! In-process host event bus
//!
//! Named broadcast channels standing in for the host process's event system.
//! Channels are created on first use; every subscriber sees every message
//! emitted after it subscribed.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::actions::{Action, ActionEnvelope};
use crate::error::IngestError;

/// Default per-channel buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Channel the host publishes state and deltas on
pub const REACTIONS_CHANNEL: &str = "tari://reactions";

/// Channel the host listens on for actions
pub const ACTIONS_CHANNEL: &str = "tari://actions";

/// Named broadcast channels shared between producers and the adapter
#[derive(Clone)]
pub struct HostBus {
    channels: Arc<DashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

impl Default for HostBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl HostBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to a channel, creating it if needed
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender(channel).subscribe()
    }

    /// Emit a raw payload. Returns how many subscribers received it.
    pub fn emit_raw(&self, channel: &str, payload: impl Into<String>) -> usize {
        let delivered = self.sender(channel).send(payload.into()).unwrap_or(0);
        debug!(channel = %channel, delivered, "Emitted host event");
        delivered
    }

    /// Serialize and emit a payload
    pub fn emit<T: Serialize>(&self, channel: &str, payload: &T) -> Result<usize, IngestError> {
        let raw = serde_json::to_string(payload).map_err(IngestError::Encode)?;
        Ok(self.emit_raw(channel, raw))
    }

    /// Wrap an action in its envelope and emit it
    pub fn send_action(&self, channel: &str, action: Action) -> Result<usize, IngestError> {
        self.emit(channel, &ActionEnvelope::new(action))
    }

    /// Drop a channel. Subscribers drain what is buffered, then see it closed.
    pub fn close(&self, channel: &str) -> bool {
        self.channels.remove(channel).is_some()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
