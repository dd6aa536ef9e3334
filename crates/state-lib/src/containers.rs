//! Container identifiers and the wire name table
//!
//! The host names containers inconsistently: snapshots key them by display
//! name ("Base Node"), deltas sometimes by token ("BaseNode"). Both spellings
//! are resolved here and nowhere else; the rest of the crate only sees
//! [`ContainerId`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::models::SessionConfig;

/// Managed units tracked by the control panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerId {
    SharedVolume,
    Tor,
    BaseNode,
    Wallet,
    Sha3Miner,
    MmProxy,
    Xmrig,
    Grafana,
    Loki,
    Promtail,
}

/// (id, display name, token)
const NAME_TABLE: &[(ContainerId, &str, &str)] = &[
    (ContainerId::SharedVolume, "Shared Volume", "SharedVolume"),
    (ContainerId::Tor, "Tor", "Tor"),
    (ContainerId::BaseNode, "Base Node", "BaseNode"),
    (ContainerId::Wallet, "Wallet", "Wallet"),
    (ContainerId::Sha3Miner, "SHA3 Miner", "Sha3Miner"),
    (ContainerId::MmProxy, "MM proxy", "MmProxy"),
    (ContainerId::Xmrig, "XMRig", "Xmrig"),
    (ContainerId::Grafana, "Grafana", "Grafana"),
    (ContainerId::Loki, "Loki", "Loki"),
    (ContainerId::Promtail, "Promtail", "Promtail"),
];

impl ContainerId {
    /// Every identifier, in table order
    pub const ALL: [ContainerId; 10] = [
        ContainerId::SharedVolume,
        ContainerId::Tor,
        ContainerId::BaseNode,
        ContainerId::Wallet,
        ContainerId::Sha3Miner,
        ContainerId::MmProxy,
        ContainerId::Xmrig,
        ContainerId::Grafana,
        ContainerId::Loki,
        ContainerId::Promtail,
    ];

    /// Resolve a wire name (display name or token). Matching is exact.
    pub fn from_wire(name: &str) -> Option<Self> {
        NAME_TABLE
            .iter()
            .find(|(_, display, token)| *display == name || *token == name)
            .map(|(id, _, _)| *id)
    }

    /// Human-readable name used by the host in snapshots
    pub fn display_name(&self) -> &'static str {
        self.entry().1
    }

    /// Compact token used as the canonical key
    pub fn token(&self) -> &'static str {
        self.entry().2
    }

    fn entry(&self) -> &'static (ContainerId, &'static str, &'static str) {
        // NAME_TABLE is ordered like ALL, one row per variant
        &NAME_TABLE[*self as usize]
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl Serialize for ContainerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

impl<'de> Deserialize<'de> for ContainerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        ContainerId::from_wire(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown container '{name}'")))
    }
}

impl SessionConfig {
    /// Whether the session layer that runs this container is switched on
    pub fn is_enabled(&self, id: ContainerId) -> bool {
        let any_layer = self.base_layer_active
            || self.wallet_active
            || self.sha3_layer_active
            || self.merge_layer_active
            || self.monitoring_layer_active;

        match id {
            ContainerId::SharedVolume => any_layer || self.tor_active,
            ContainerId::Tor => self.tor_active || any_layer,
            ContainerId::BaseNode => self.base_layer_active,
            ContainerId::Wallet => self.wallet_active,
            ContainerId::Sha3Miner => self.sha3_layer_active,
            ContainerId::MmProxy | ContainerId::Xmrig => self.merge_layer_active,
            ContainerId::Grafana | ContainerId::Loki | ContainerId::Promtail => {
                self.monitoring_layer_active
            }
        }
    }
}
