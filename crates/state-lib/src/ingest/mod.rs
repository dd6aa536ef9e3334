//! Ingestion of the host event stream
//!
//! This module provides:
//! - Envelope decoding and classification (snapshot, delta, unrecognized)
//! - Dispatch of decoded updates to the reconciler
//! - The subscription-based adapter and its teardown guarantees
//! - An in-process named-channel bus standing in for the host event system

mod adapter;
mod bus;
mod dispatch;
mod envelope;


pub use adapter::{AdapterConfig, EventAdapter, Subscription, SubscriptionStatus};
pub use bus::{HostBus, ACTIONS_CHANNEL, DEFAULT_CHANNEL_CAPACITY, REACTIONS_CHANNEL};
pub use dispatch::{EnvelopeKind, IngestReport, Ingestor};
pub use envelope::{classify, Delta, DeltaOp, Envelope};
