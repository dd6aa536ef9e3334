//! State synchronization core for the launchpad control panel
//!
//! This crate provides:
//! - Typed models for the host's snapshots, deltas and actions
//! - The container identifier table bridging display names and tokens
//! - The reconciler owning canonical state and derived resource metrics
//! - The ingestion adapter subscribing to the host event channel
//! - Metrics and structured logging

pub mod actions;
pub mod containers;
pub mod error;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod reconciler;
pub mod status;

pub use actions::{Action, ActionEnvelope};
pub use containers::ContainerId;
pub use error::IngestError;
pub use ingest::{AdapterConfig, EventAdapter, HostBus, IngestReport, Ingestor, Subscription};
pub use models::*;
pub use observability::{StructuredLogger, SyncMetrics};
pub use reconciler::{AppState, ContainerRecord, Outcome, Snapshot, StateStore, StoreConfig};
pub use status::{TaskProgress, TaskStatus};
