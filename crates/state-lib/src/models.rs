//! Core data models for the launchpad state
//!
//! Wire payloads published by the host process and the canonical records
//! the reconciler keeps for the presentation layer.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Raw resource counters reported by the host for one container
///
/// Counters are cumulative; utilisation is derived from two consecutive samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSample {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub system_cpu_usage: u64,
    pub cpu_usage: u64,
    pub mem_limit: u64,
    pub mem_usage: u64,
}

/// RFC 3339 with an offset, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;

    if let Ok(zoned) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(zoned.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

/// Latest sample of a container together with the metrics derived from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub sample: ResourceSample,
    /// `None` until a second sample is available
    pub cpu_percent: Option<f64>,
    /// `None` when the container reports no memory limit
    pub mem_percent: Option<f64>,
}

/// Persisted settings nested inside the session configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentSettings {
    pub tari_network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_payment_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monero_mining_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monerod_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha3_miner_threads: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Session flags, one per independently toggleable layer, plus persisted settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tor_active: bool,
    pub base_layer_active: bool,
    pub wallet_active: bool,
    pub sha3_layer_active: bool,
    pub merge_layer_active: bool,
    pub monitoring_layer_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<PersistentSettings>,
}

/// Partial session update; absent fields leave the current value untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tor_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_layer_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha3_layer_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_layer_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring_layer_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<PersistentSettings>,
}

impl ConfigDelta {
    /// True when the delta carries no field at all
    pub fn is_empty(&self) -> bool {
        self == &ConfigDelta::default()
    }

    /// Shallow-merge the present fields into `config`.
    /// Returns true if any field changed.
    pub fn merge_into(self, config: &mut SessionConfig) -> bool {
        let before = config.clone();

        if let Some(v) = self.tor_active {
            config.tor_active = v;
        }
        if let Some(v) = self.base_layer_active {
            config.base_layer_active = v;
        }
        if let Some(v) = self.wallet_active {
            config.wallet_active = v;
        }
        if let Some(v) = self.sha3_layer_active {
            config.sha3_layer_active = v;
        }
        if let Some(v) = self.merge_layer_active {
            config.merge_layer_active = v;
        }
        if let Some(v) = self.monitoring_layer_active {
            config.monitoring_layer_active = v;
        }
        if self.settings.is_some() {
            config.settings = self.settings;
        }

        *config != before
    }
}

/// Wallet balance in micro-units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletBalance {
    pub available: u64,
    pub pending_incoming: u64,
    pub pending_outgoing: u64,
}

/// One wallet transaction as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletTransaction {
    pub tx_id: String,
    pub direction: String,
    pub amount: u64,
    pub status: String,
    pub message: String,
}

/// Wallet sub-state, always replaced as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletState {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<WalletBalance>,
    pub transactions: Vec<WalletTransaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_delta_merge_preserves_unrelated_fields() {
        let mut config = SessionConfig {
            tor_active: false,
            wallet_active: true,
            ..Default::default()
        };

        let delta: ConfigDelta = serde_json::from_str(r#"{"tor_active": true}"#).unwrap();
        assert!(delta.merge_into(&mut config));

        assert!(config.tor_active);
        assert!(config.wallet_active);
        assert!(!config.base_layer_active);
    }

    #[test]
    fn test_config_delta_replaces_settings_wholesale() {
        let mut config = SessionConfig {
            settings: Some(PersistentSettings {
                tari_network: "esmeralda".to_string(),
                tag: Some("v1".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let delta: ConfigDelta =
            serde_json::from_str(r#"{"settings": {"tari_network": "nextnet"}}"#).unwrap();
        delta.merge_into(&mut config);

        let settings = config.settings.unwrap();
        assert_eq!(settings.tari_network, "nextnet");
        assert_eq!(settings.tag, None);
    }

    #[test]
    fn test_config_delta_no_change() {
        let mut config = SessionConfig {
            tor_active: true,
            ..Default::default()
        };
        let delta = ConfigDelta {
            tor_active: Some(true),
            ..Default::default()
        };
        assert!(!delta.merge_into(&mut config));
        assert!(ConfigDelta::default().is_empty());
    }

    #[test]
    fn test_wallet_state_defaults() {
        let wallet: WalletState = serde_json::from_str(r#"{"active": true}"#).unwrap();
        assert!(wallet.active);
        assert!(wallet.balance.is_none());
        assert!(wallet.transactions.is_empty());
    }

    #[test]
    fn test_resource_sample_timestamp_format() {
        let sample: ResourceSample = serde_json::from_str(
            r#"{"timestamp": "2024-03-01T12:00:00", "system_cpu_usage": 1000,
                "cpu_usage": 100, "mem_limit": 2048, "mem_usage": 512}"#,
        )
        .unwrap();
        assert_eq!(sample.cpu_usage, 100);
        assert_eq!(sample.timestamp.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    fn sample_at(timestamp: &str) -> Result<ResourceSample, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "timestamp": timestamp, "system_cpu_usage": 1, "cpu_usage": 1,
            "mem_limit": 1, "mem_usage": 1
        }))
    }

    #[test]
    fn test_resource_sample_accepts_zoned_timestamps() {
        let naive = sample_at("2024-03-01T12:00:00").unwrap().timestamp;

        assert_eq!(sample_at("2024-03-01T12:00:00Z").unwrap().timestamp, naive);
        assert_eq!(sample_at("2024-03-01T12:00:00+00:00").unwrap().timestamp, naive);
        assert_eq!(sample_at("2024-03-01T14:00:00+02:00").unwrap().timestamp, naive);
        assert_eq!(
            sample_at("2024-03-01T12:00:00.250Z").unwrap().timestamp.timestamp_millis(),
            naive.timestamp_millis() + 250
        );
    }

    #[test]
    fn test_resource_sample_rejects_garbage_timestamp() {
        assert!(sample_at("yesterday").is_err());
    }
}
