//! Event ingestion adapter
//!
//! Subscribes to a single host channel and feeds every message through an
//! [`Ingestor`]. Delivery runs on one task, so mutations are sequential and
//! applied in channel order. If the adapter falls behind and the channel drops
//! messages, it asks the host for a fresh snapshot with a `Connect` action.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::bus::{HostBus, ACTIONS_CHANNEL, REACTIONS_CHANNEL};
use super::dispatch::Ingestor;
use crate::actions::Action;
use crate::observability::StructuredLogger;
use crate::reconciler::StateStore;

/// Configuration for the ingestion adapter
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Channel the host publishes reactions on (default: `tari://reactions`)
    pub channel: String,
    /// Channel a `Connect` is sent on after dropped messages
    /// (default: `tari://actions`); `None` disables resync
    pub resync_channel: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            channel: REACTIONS_CHANNEL.to_string(),
            resync_channel: Some(ACTIONS_CHANNEL.to_string()),
        }
    }
}

/// Where to request a fresh snapshot once delivery has lost messages
struct Resync {
    bus: HostBus,
    channel: String,
}

impl Resync {
    fn request(&self, logger: &StructuredLogger) {
        match self.bus.send_action(&self.channel, Action::Connect) {
            Ok(delivered) => logger.log_resync_requested(&self.channel, delivered),
            Err(e) => logger.log_discarded(e.reason(), &e.to_string()),
        }
    }
}

/// Delivery gate shared by the subscription and its task.
///
/// Every delivery holds the lock while it mutates state; closing the gate
/// under the same lock means no mutation can follow `unsubscribe`.
#[derive(Clone)]
struct Gate(Arc<Mutex<bool>>);

impl Gate {
    fn open() -> Self {
        Self(Arc::new(Mutex::new(true)))
    }

    fn close(&self) -> bool {
        let mut open = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *open, false)
    }

    fn is_open(&self) -> bool {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` only while the gate is open. Returns false once closed.
    fn deliver(&self, f: impl FnOnce()) -> bool {
        let open = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            return false;
        }
        f();
        true
    }
}

/// Cheap, clonable view of whether a subscription is still delivering
#[derive(Clone)]
pub struct SubscriptionStatus {
    gate: Gate,
}

impl SubscriptionStatus {
    pub fn is_active(&self) -> bool {
        self.gate.is_open()
    }
}

/// Handle to a running subscription
///
/// Unsubscribes when dropped.
pub struct Subscription {
    gate: Gate,
    task: Option<JoinHandle<()>>,
    logger: StructuredLogger,
}

impl Subscription {
    /// Stop delivery. Idempotent; safe after the channel has closed.
    ///
    /// Once this returns no further mutation reaches the store, even if the
    /// channel still holds messages.
    pub fn unsubscribe(&mut self) {
        let was_open = self.gate.close();

        if let Some(task) = self.task.take() {
            task.abort();
        }

        if was_open {
            self.logger.log_unsubscribed("requested");
        }
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_open()
    }

    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus {
            gate: self.gate.clone(),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Binds a host channel to the reconciler
pub struct EventAdapter {
    config: AdapterConfig,
    ingestor: Ingestor,
}

impl EventAdapter {
    pub fn new(config: AdapterConfig, store: StateStore) -> Self {
        let logger = StructuredLogger::new(config.channel.clone());
        Self {
            ingestor: Ingestor::new(store, logger),
            config,
        }
    }

    /// Subscribe to the configured channel on `bus` and start delivering.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(self, bus: &HostBus) -> Subscription {
        let rx = bus.subscribe(&self.config.channel);
        let resync = self.config.resync_channel.clone().map(|channel| Resync {
            bus: bus.clone(),
            channel,
        });
        self.start(rx, resync)
    }

    /// Start delivering from an existing receiver.
    ///
    /// Without a bus there is nowhere to send `Connect`, so lag is only logged.
    pub fn subscribe_receiver(self, rx: broadcast::Receiver<String>) -> Subscription {
        self.start(rx, None)
    }

    fn start(self, rx: broadcast::Receiver<String>, resync: Option<Resync>) -> Subscription {
        let gate = Gate::open();
        let logger = self.ingestor.logger().clone();
        logger.log_subscribed();

        let task = tokio::spawn(run_delivery(rx, self.ingestor, gate.clone(), resync));

        Subscription {
            gate,
            task: Some(task),
            logger,
        }
    }
}

async fn run_delivery(
    mut rx: broadcast::Receiver<String>,
    ingestor: Ingestor,
    gate: Gate,
    resync: Option<Resync>,
) {
    loop {
        match rx.recv().await {
            Ok(raw) => {
                if !gate.deliver(|| {
                    ingestor.handle_message(&raw);
                }) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                ingestor.logger().log_lagged(skipped);
                if let Some(resync) = &resync {
                    resync.request(ingestor.logger());
                }
            }
            Err(RecvError::Closed) => {
                if gate.close() {
                    ingestor.logger().log_unsubscribed("channel closed");
                }
                break;
            }
        }
    }
}
