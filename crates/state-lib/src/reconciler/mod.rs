//! Canonical application state and the operations that mutate it
//!
//! [`AppState`] holds exactly one [`ContainerRecord`] per [`ContainerId`]
//! together with the session configuration and wallet. Snapshots replace it
//! wholesale, deltas patch it in place. [`StateStore`] wraps it in a watch
//! channel so the presentation layer can observe changes.

mod stats;

#[cfg(test)]
mod tests;

pub use stats::{advance, cpu_percent, mem_percent};

use crate::containers::ContainerId;
use crate::models::{ConfigDelta, ResourceSample, ResourceUsage, SessionConfig, WalletState};
use crate::status::TaskStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Default number of log lines kept per container
pub const DEFAULT_LOG_TAIL_CAPACITY: usize = 100;

/// Result of a single reconciler operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State was mutated
    Applied,
    /// The update matched the current state
    Unchanged,
    /// Stats sample with an already-stored timestamp
    Duplicate,
    /// No container with that identifier
    UnknownContainer,
}

impl Outcome {
    pub fn mutated(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    /// Label used for skip metrics
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Unchanged => "unchanged",
            Outcome::Duplicate => "duplicate",
            Outcome::UnknownContainer => "unknown_container",
        }
    }
}

/// Status and metrics tracking unit for one managed container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerRecord {
    pub id: ContainerId,
    pub status: TaskStatus,
    pub permanent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResourceUsage>,
    pub logs: VecDeque<String>,
}

impl ContainerRecord {
    pub fn new(id: ContainerId) -> Self {
        Self {
            id,
            status: TaskStatus::Inactive,
            permanent: false,
            last_error: None,
            usage: None,
            logs: VecDeque::new(),
        }
    }

    pub fn progress(&self) -> Option<&crate::status::TaskProgress> {
        self.status.progress()
    }

    fn set_status(&mut self, status: TaskStatus) {
        match &status {
            TaskStatus::Failed(reason) => self.last_error = Some(reason.clone()),
            TaskStatus::Active => self.last_error = None,
            _ => {}
        }
        self.status = status;
    }

    fn push_log(&mut self, line: String, capacity: usize) {
        self.logs.push_back(line);
        while self.logs.len() > capacity {
            self.logs.pop_front();
        }
    }
}

/// Container entry as found in a full-state snapshot
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SnapshotContainer {
    status: Value,
    permanent: bool,
    stats: Option<ResourceSample>,
    logs: Vec<String>,
    error: Option<String>,
}

/// Full-state payload published by the host
///
/// Container entries stay raw until reindexing so one bad entry does not
/// reject the whole snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub config: SessionConfig,
    pub containers: BTreeMap<String, Value>,
    pub wallet: WalletState,
}

/// What happened to the entries of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    /// Containers seeded from the snapshot
    pub applied: Vec<ContainerId>,
    /// Keys that match no known container
    pub unknown: Vec<String>,
    /// Entries left at their default or dropped, with the reason
    pub rejected: Vec<(String, String)>,
}

/// Canonical in-memory state consumed by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppState {
    pub config: SessionConfig,
    containers: BTreeMap<ContainerId, ContainerRecord>,
    pub wallet: WalletState,
    #[serde(skip)]
    log_tail_capacity: usize,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_TAIL_CAPACITY)
    }
}

impl AppState {
    /// Fresh state: every container Inactive, default session and wallet
    pub fn new(log_tail_capacity: usize) -> Self {
        Self {
            config: SessionConfig::default(),
            containers: fresh_containers(),
            wallet: WalletState::default(),
            log_tail_capacity,
        }
    }

    pub fn container(&self, id: ContainerId) -> Option<&ContainerRecord> {
        self.containers.get(&id)
    }

    /// All records in identifier order
    pub fn containers(&self) -> impl Iterator<Item = &ContainerRecord> {
        self.containers.values()
    }

    pub fn active_count(&self) -> usize {
        self.containers.values().filter(|c| c.status.is_active()).count()
    }

    /// Replace the whole state.
    ///
    /// Snapshot keys are display names or tokens; each is reindexed onto the
    /// fixed identifier set. Containers absent from the snapshot are Inactive.
    /// When one container appears under both spellings, the first key in map
    /// order wins and the other entry is rejected.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        let mut containers = fresh_containers();
        let mut seen = BTreeSet::new();

        for (name, raw) in snapshot.containers {
            let Some(id) = ContainerId::from_wire(&name) else {
                report.unknown.push(name);
                continue;
            };

            if !seen.insert(id) {
                report
                    .rejected
                    .push((name, format!("duplicate entry for container {}", id)));
                continue;
            }

            let entry: SnapshotContainer = match serde_json::from_value(raw) {
                Ok(entry) => entry,
                Err(e) => {
                    report.rejected.push((name, e.to_string()));
                    continue;
                }
            };

            let Some(record) = containers.get_mut(&id) else {
                continue;
            };
            record.permanent = entry.permanent;
            record.usage = entry.stats.and_then(|sample| advance(None, sample));
            for line in entry.logs {
                record.push_log(line, self.log_tail_capacity);
            }

            if !entry.status.is_null() {
                match TaskStatus::normalize(&entry.status) {
                    Ok(status) => record.set_status(status),
                    Err(e) => {
                        report.rejected.push((name, e.to_string()));
                        continue;
                    }
                }
            }

            // The host's own error text wins over one derived from the status
            if entry.error.is_some() {
                record.last_error = entry.error;
            }

            report.applied.push(id);
        }

        self.config = snapshot.config;
        self.wallet = snapshot.wallet;
        self.containers = containers;

        report
    }

    /// Shallow-merge the fields present in `delta` into the session
    pub fn apply_config_delta(&mut self, delta: ConfigDelta) -> Outcome {
        if delta.merge_into(&mut self.config) {
            Outcome::Applied
        } else {
            Outcome::Unchanged
        }
    }

    /// Replace one container's status, keeping its permanence flag
    pub fn apply_status_delta(&mut self, id: ContainerId, status: TaskStatus) -> Outcome {
        let Some(record) = self.containers.get_mut(&id) else {
            return Outcome::UnknownContainer;
        };

        if record.status == status {
            return Outcome::Unchanged;
        }

        record.set_status(status);
        Outcome::Applied
    }

    /// Store a new resource sample and derive utilisation from the previous one
    pub fn apply_stats_delta(&mut self, id: ContainerId, sample: ResourceSample) -> Outcome {
        let Some(record) = self.containers.get_mut(&id) else {
            return Outcome::UnknownContainer;
        };

        match advance(record.usage.as_ref(), sample) {
            Some(usage) => {
                record.usage = Some(usage);
                Outcome::Applied
            }
            None => {
                debug!(container = %id, "Dropping stats sample with repeated timestamp");
                Outcome::Duplicate
            }
        }
    }

    /// Replace the container's last error with the host-reported text
    pub fn apply_error_delta(&mut self, id: ContainerId, error: Option<String>) -> Outcome {
        let Some(record) = self.containers.get_mut(&id) else {
            return Outcome::UnknownContainer;
        };

        if record.last_error == error {
            return Outcome::Unchanged;
        }

        record.last_error = error;
        Outcome::Applied
    }

    /// Append one line to the container's bounded log tail
    pub fn append_log(&mut self, id: ContainerId, line: String) -> Outcome {
        let capacity = self.log_tail_capacity;
        let Some(record) = self.containers.get_mut(&id) else {
            return Outcome::UnknownContainer;
        };

        record.push_log(line, capacity);
        Outcome::Applied
    }

    /// Replace the wallet sub-state as a whole
    pub fn apply_wallet_delta(&mut self, wallet: WalletState) -> Outcome {
        if self.wallet == wallet {
            return Outcome::Unchanged;
        }
        self.wallet = wallet;
        Outcome::Applied
    }
}

fn fresh_containers() -> BTreeMap<ContainerId, ContainerRecord> {
    ContainerId::ALL
        .iter()
        .map(|id| (*id, ContainerRecord::new(*id)))
        .collect()
}

/// Configuration for the state store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Log lines kept per container (default: 100)
    pub log_tail_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_tail_capacity: DEFAULT_LOG_TAIL_CAPACITY,
        }
    }
}

/// Observable handle to the canonical state
///
/// Clones share the same state. Observers obtained from [`StateStore::watch`]
/// are woken only when an operation actually mutated something.
#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<AppState>>,
}

impl StateStore {
    pub fn new(config: StoreConfig) -> Self {
        let (tx, _rx) = watch::channel(AppState::new(config.log_tail_capacity));
        Self { tx: Arc::new(tx) }
    }

    /// Receiver for the presentation layer
    pub fn watch(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }

    /// Clone of the current state
    pub fn current(&self) -> AppState {
        self.tx.borrow().clone()
    }

    /// Read the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Run an operation against the state, notifying observers if it mutated
    pub fn apply(&self, op: impl FnOnce(&mut AppState) -> Outcome) -> Outcome {
        let mut outcome = Outcome::Unchanged;
        self.tx.send_if_modified(|state| {
            outcome = op(state);
            outcome.mutated()
        });
        outcome
    }

    pub fn apply_snapshot(&self, snapshot: Snapshot) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        self.tx.send_modify(|state| {
            report = state.apply_snapshot(snapshot);
        });
        report
    }

    pub fn apply_config_delta(&self, delta: ConfigDelta) -> Outcome {
        self.apply(|state| state.apply_config_delta(delta))
    }

    pub fn apply_status_delta(&self, id: ContainerId, status: TaskStatus) -> Outcome {
        self.apply(|state| state.apply_status_delta(id, status))
    }

    pub fn apply_stats_delta(&self, id: ContainerId, sample: ResourceSample) -> Outcome {
        self.apply(|state| state.apply_stats_delta(id, sample))
    }

    pub fn apply_error_delta(&self, id: ContainerId, error: Option<String>) -> Outcome {
        self.apply(|state| state.apply_error_delta(id, error))
    }

    pub fn append_log(&self, id: ContainerId, line: String) -> Outcome {
        self.apply(|state| state.append_log(id, line))
    }

    pub fn apply_wallet_delta(&self, wallet: WalletState) -> Outcome {
        self.apply(|state| state.apply_wallet_delta(wallet))
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
