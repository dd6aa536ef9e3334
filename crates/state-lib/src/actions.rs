//! Outbound actions sent to the host process
//!
//! Envelope shape: `{"Action": {"type": "Connect" | "ChangeSession" | "SaveSettings", "payload": ...}}`.
//! The reconciler never reacts to these directly; their effects come back
//! on the reaction channel as snapshots or deltas.

use serde::{Deserialize, Serialize};

use crate::models::{PersistentSettings, SessionConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Action {
    Connect,
    ChangeSession(SessionConfig),
    SaveSettings(PersistentSettings),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Connect => "Connect",
            Action::ChangeSession(_) => "ChangeSession",
            Action::SaveSettings(_) => "SaveSettings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    #[serde(rename = "Action")]
    pub action: Action,
}

impl ActionEnvelope {
    pub fn new(action: Action) -> Self {
        Self { action }
    }
}
