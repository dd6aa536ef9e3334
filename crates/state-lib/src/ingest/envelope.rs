//! Envelope decoding and classification
//!
//! An envelope is `{"State": Snapshot}` or `{"Delta": DeltaPayload}`. A delta
//! may carry any combination of `UpdateConfig`, `TaskDelta` and `WalletDelta`,
//! and a task delta any of `UpdateStatus`, `StatsRecord`, `LogRecord`, `Error`;
//! each sub-field is decoded on its own so one malformed part does not hide
//! the others.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::IngestError;
use crate::models::{ConfigDelta, ResourceSample, WalletState};
use crate::reconciler::Snapshot;
use crate::status::TaskStatus;

const STATE_KEY: &str = "State";
const DELTA_KEY: &str = "Delta";

/// One decoded update carried by a delta
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOp {
    UpdateConfig(ConfigDelta),
    Status { id: String, status: TaskStatus },
    Stats { id: String, sample: ResourceSample },
    Log { id: String, line: String },
    Error { id: String, error: Option<String> },
    Wallet(WalletState),
}

impl DeltaOp {
    /// Operation name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            DeltaOp::UpdateConfig(_) => "update_config",
            DeltaOp::Status { .. } => "update_status",
            DeltaOp::Stats { .. } => "stats_record",
            DeltaOp::Log { .. } => "log_record",
            DeltaOp::Error { .. } => "error_record",
            DeltaOp::Wallet(_) => "wallet_delta",
        }
    }
}

/// Decoded delta: the updates that parsed and the ones that did not
#[derive(Debug, Default)]
pub struct Delta {
    pub ops: Vec<DeltaOp>,
    pub rejected: Vec<IngestError>,
    /// Top-level keys of the delta payload
    pub keys: Vec<String>,
}

/// Classified envelope
#[derive(Debug)]
pub enum Envelope {
    State(Snapshot),
    Delta(Delta),
    /// Object with neither `State` nor `Delta`
    Unrecognized(Vec<String>),
}

#[derive(Deserialize)]
struct RawTaskDelta {
    id: String,
    #[serde(default)]
    delta: Map<String, Value>,
}

/// Decode and classify a raw envelope
pub fn classify(raw: &str) -> Result<Envelope, IngestError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(mut map) = value else {
        return Err(IngestError::NotAnObject);
    };

    match (map.remove(STATE_KEY), map.remove(DELTA_KEY)) {
        (Some(_), Some(_)) => Err(IngestError::AmbiguousEnvelope),
        (Some(state), None) => serde_json::from_value(state)
            .map(Envelope::State)
            .map_err(|e| IngestError::payload(STATE_KEY, e)),
        (None, Some(delta)) => decode_delta(delta).map(Envelope::Delta),
        (None, None) => Ok(Envelope::Unrecognized(map.keys().cloned().collect())),
    }
}

fn decode_delta(value: Value) -> Result<Delta, IngestError> {
    let map: Map<String, Value> =
        serde_json::from_value(value).map_err(|e| IngestError::payload(DELTA_KEY, e))?;

    let mut delta = Delta {
        keys: map.keys().cloned().collect(),
        ..Default::default()
    };

    if let Some(config) = map.get("UpdateConfig") {
        match ConfigDelta::deserialize(config) {
            Ok(config) => delta.ops.push(DeltaOp::UpdateConfig(config)),
            Err(e) => delta.rejected.push(IngestError::payload("UpdateConfig", e)),
        }
    }

    if let Some(task) = map.get("TaskDelta") {
        decode_task_delta(task, &mut delta);
    }

    if let Some(wallet) = map.get("WalletDelta") {
        match WalletState::deserialize(wallet) {
            Ok(wallet) => delta.ops.push(DeltaOp::Wallet(wallet)),
            Err(e) => delta.rejected.push(IngestError::payload("WalletDelta", e)),
        }
    }

    Ok(delta)
}

fn decode_task_delta(value: &Value, delta: &mut Delta) {
    let task = match RawTaskDelta::deserialize(value) {
        Ok(task) => task,
        Err(e) => {
            delta.rejected.push(IngestError::payload("TaskDelta", e));
            return;
        }
    };

    if let Some(status) = task.delta.get("UpdateStatus") {
        match TaskStatus::normalize(status) {
            Ok(status) => delta.ops.push(DeltaOp::Status {
                id: task.id.clone(),
                status,
            }),
            Err(e) => delta.rejected.push(e),
        }
    }

    if let Some(stats) = task.delta.get("StatsRecord") {
        match ResourceSample::deserialize(stats) {
            Ok(sample) => delta.ops.push(DeltaOp::Stats {
                id: task.id.clone(),
                sample,
            }),
            Err(e) => delta.rejected.push(IngestError::payload("StatsRecord", e)),
        }
    }

    if let Some(log) = task.delta.get("LogRecord") {
        let line = match log {
            Value::String(line) => line.clone(),
            other => other.to_string(),
        };
        delta.ops.push(DeltaOp::Log {
            id: task.id.clone(),
            line,
        });
    }

    // Applied after the status so an Active transition cannot clear it
    if let Some(error) = task.delta.get("Error") {
        match Option::<String>::deserialize(error) {
            Ok(error) => delta.ops.push(DeltaOp::Error { id: task.id, error }),
            Err(e) => delta.rejected.push(IngestError::payload("Error", e)),
        }
    }
}
