//! Scenario tests for the reconciler
//!
//! These drive [`AppState`] and [`StateStore`] directly, without the
//! envelope layer, through snapshot and delta sequences.

use super::*;
use crate::models::{PersistentSettings, WalletBalance, WalletTransaction};
use crate::status::TaskProgress;
use chrono::{DateTime, Utc};
use serde_json::json;

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn sample(secs: i64, cpu: u64, system: u64) -> ResourceSample {
    ResourceSample {
        timestamp: ts(secs),
        system_cpu_usage: system,
        cpu_usage: cpu,
        mem_limit: 4096,
        mem_usage: 1024,
    }
}

fn snapshot(containers: serde_json::Value) -> Snapshot {
    serde_json::from_value(json!({
        "config": {"tor_active": false, "wallet_active": true},
        "containers": containers,
        "wallet": {"active": false}
    }))
    .unwrap()
}

mod snapshot_tests {
    use super::*;

    #[test]
    fn test_snapshot_always_yields_every_container() {
        let mut state = AppState::default();

        let inputs = [
            json!({}),
            json!({"Base Node": {"status": "Active"}}),
            json!({"Tor": {"status": "Pending"}, "Nonsense": {"status": "Active"}}),
            json!({"SHA3 Miner": {"status": "Active"}, "MM proxy": {"status": "Active"},
                   "XMRig": {"status": "Active"}, "Grafana": {}, "Loki": {}, "Promtail": {},
                   "Shared Volume": {}, "Wallet": {}, "Tor": {}, "Base Node": {}}),
        ];

        for input in inputs {
            state.apply_snapshot(snapshot(input));
            assert_eq!(state.containers().count(), ContainerId::ALL.len());
            for id in ContainerId::ALL {
                assert_eq!(state.container(id).unwrap().id, id);
            }
        }
    }

    #[test]
    fn test_snapshot_reindexes_display_names() {
        let mut state = AppState::default();
        let report = state.apply_snapshot(snapshot(json!({
            "Base Node": {"status": "Active", "permanent": true},
            "MM proxy": {"status": {"Progress": {"pct": 30, "stage": "Starting"}}},
        })));

        assert_eq!(report.applied.len(), 2);
        assert!(report.unknown.is_empty());

        let base = state.container(ContainerId::BaseNode).unwrap();
        assert_eq!(base.status, TaskStatus::Active);
        assert!(base.permanent);

        let proxy = state.container(ContainerId::MmProxy).unwrap();
        assert_eq!(
            proxy.progress(),
            Some(&TaskProgress {
                pct: 30,
                stage: "Starting".to_string()
            })
        );

        assert_eq!(
            state.container(ContainerId::Tor).unwrap().status,
            TaskStatus::Inactive
        );
    }

    #[test]
    fn test_snapshot_reports_unknown_and_rejected_entries() {
        let mut state = AppState::default();
        let report = state.apply_snapshot(snapshot(json!({
            "Monerod": {"status": "Active"},
            "Tor": {"status": "Exploded"},
            "Wallet": {"permanent": "yes"},
        })));

        assert_eq!(report.unknown, vec!["Monerod".to_string()]);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(
            state.container(ContainerId::Tor).unwrap().status,
            TaskStatus::Inactive
        );
    }

    #[test]
    fn test_snapshot_resets_previous_records() {
        let mut state = AppState::default();
        state.apply_status_delta(ContainerId::Loki, TaskStatus::Active);
        state.apply_stats_delta(ContainerId::Loki, sample(0, 1, 10));
        state.append_log(ContainerId::Loki, "ready".to_string());

        state.apply_snapshot(snapshot(json!({})));

        let loki = state.container(ContainerId::Loki).unwrap();
        assert_eq!(loki, &ContainerRecord::new(ContainerId::Loki));
        assert!(state.config.wallet_active);
    }

    #[test]
    fn test_snapshot_seeds_stats_without_cpu() {
        let mut state = AppState::default();
        state.apply_snapshot(snapshot(json!({
            "Base Node": {
                "status": "Active",
                "stats": {"timestamp": "2024-03-01T12:00:00", "system_cpu_usage": 1000,
                          "cpu_usage": 100, "mem_limit": 0, "mem_usage": 10},
                "logs": ["a", "b"]
            }
        })));

        let base = state.container(ContainerId::BaseNode).unwrap();
        let usage = base.usage.as_ref().unwrap();
        assert_eq!(usage.cpu_percent, None);
        assert_eq!(usage.mem_percent, None);
        assert_eq!(base.logs.len(), 2);
    }

    #[test]
    fn test_snapshot_passes_host_error_through() {
        let mut state = AppState::default();
        state.apply_snapshot(snapshot(json!({
            "Base Node": {"status": "Pending", "error": "disk full"},
            "Wallet": {"status": {"Failed": "exit 1"}, "error": "wallet.db locked"},
            "Tor": {"status": "Failed"}
        })));

        let error = |id| state.container(id).unwrap().last_error.clone();
        assert_eq!(error(ContainerId::BaseNode).as_deref(), Some("disk full"));
        assert_eq!(error(ContainerId::Wallet).as_deref(), Some("wallet.db locked"));
        assert_eq!(error(ContainerId::Tor).as_deref(), Some(""));
        assert_eq!(error(ContainerId::Loki), None);
    }

    #[test]
    fn test_snapshot_first_spelling_wins() {
        let mut state = AppState::default();
        let report = state.apply_snapshot(snapshot(json!({
            "Base Node": {"status": "Active", "permanent": true, "logs": ["a"]},
            "BaseNode": {"status": "Pending", "logs": ["b"]}
        })));

        assert_eq!(report.applied, vec![ContainerId::BaseNode]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, "BaseNode");

        let base = state.container(ContainerId::BaseNode).unwrap();
        assert_eq!(base.status, TaskStatus::Active);
        assert!(base.permanent);
        assert_eq!(base.logs, VecDeque::from(vec!["a".to_string()]));
    }
}

mod delta_tests {
    use super::*;

    #[test]
    fn test_status_delta_keeps_permanence() {
        let mut state = AppState::default();
        state.apply_snapshot(snapshot(json!({
            "Base Node": {"status": "Inactive", "permanent": true}
        })));

        let outcome = state.apply_status_delta(ContainerId::BaseNode, TaskStatus::Pending);
        assert_eq!(outcome, Outcome::Applied);

        let base = state.container(ContainerId::BaseNode).unwrap();
        assert_eq!(base.status, TaskStatus::Pending);
        assert!(base.permanent);
    }

    #[test]
    fn test_status_delta_same_status_is_unchanged() {
        let mut state = AppState::default();
        assert_eq!(
            state.apply_status_delta(ContainerId::Tor, TaskStatus::Inactive),
            Outcome::Unchanged
        );
    }

    #[test]
    fn test_failed_is_retryable_and_tracks_last_error() {
        let mut state = AppState::default();
        let id = ContainerId::Sha3Miner;

        state.apply_status_delta(id, TaskStatus::Failed("image missing".to_string()));
        assert_eq!(
            state.container(id).unwrap().last_error.as_deref(),
            Some("image missing")
        );

        state.apply_status_delta(id, TaskStatus::Pending);
        let record = state.container(id).unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.last_error.as_deref(), Some("image missing"));

        state.apply_status_delta(id, TaskStatus::Active);
        assert_eq!(state.container(id).unwrap().last_error, None);
    }

    #[test]
    fn test_error_delta_sets_and_clears_last_error() {
        let mut state = AppState::default();
        let id = ContainerId::Xmrig;

        assert_eq!(
            state.apply_error_delta(id, Some("pool unreachable".to_string())),
            Outcome::Applied
        );
        assert_eq!(
            state.container(id).unwrap().last_error.as_deref(),
            Some("pool unreachable")
        );
        assert_eq!(
            state.apply_error_delta(id, Some("pool unreachable".to_string())),
            Outcome::Unchanged
        );

        assert_eq!(state.apply_error_delta(id, None), Outcome::Applied);
        assert_eq!(state.container(id).unwrap().last_error, None);
    }

    #[test]
    fn test_stats_deltas_derive_cpu_percent() {
        let mut state = AppState::default();
        let id = ContainerId::BaseNode;

        assert_eq!(state.apply_stats_delta(id, sample(0, 100, 1000)), Outcome::Applied);
        assert_eq!(
            state.container(id).unwrap().usage.as_ref().unwrap().cpu_percent,
            None
        );

        assert_eq!(state.apply_stats_delta(id, sample(1, 150, 1500)), Outcome::Applied);
        let usage = state.container(id).unwrap().usage.clone().unwrap();
        assert_eq!(usage.cpu_percent, Some(10.0));
        assert_eq!(usage.mem_percent, Some(25.0));
    }

    #[test]
    fn test_stats_delta_with_repeated_timestamp_is_ignored() {
        let mut state = AppState::default();
        let id = ContainerId::Xmrig;

        state.apply_stats_delta(id, sample(0, 100, 1000));
        state.apply_stats_delta(id, sample(1, 150, 1500));
        let before = state.clone();

        assert_eq!(
            state.apply_stats_delta(id, sample(1, 900, 9000)),
            Outcome::Duplicate
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_stats_delta_zero_system_delta_is_finite() {
        let mut state = AppState::default();
        let id = ContainerId::Tor;

        state.apply_stats_delta(id, sample(0, 100, 1000));
        state.apply_stats_delta(id, sample(1, 150, 1000));

        let pct = state
            .container(id)
            .unwrap()
            .usage
            .as_ref()
            .unwrap()
            .cpu_percent
            .unwrap();
        assert_eq!(pct, 0.0);
    }

    #[test]
    fn test_config_delta_is_shallow() {
        let mut state = AppState::default();
        state.apply_snapshot(snapshot(json!({})));

        let outcome = state.apply_config_delta(ConfigDelta {
            tor_active: Some(true),
            ..Default::default()
        });

        assert_eq!(outcome, Outcome::Applied);
        assert!(state.config.tor_active);
        assert!(state.config.wallet_active);
    }

    #[test]
    fn test_config_delta_settings() {
        let mut state = AppState::default();
        state.apply_config_delta(ConfigDelta {
            settings: Some(PersistentSettings {
                tari_network: "esmeralda".to_string(),
                sha3_miner_threads: Some(4),
                ..Default::default()
            }),
            ..Default::default()
        });

        let settings = state.config.settings.as_ref().unwrap();
        assert_eq!(settings.sha3_miner_threads, Some(4));
    }

    #[test]
    fn test_wallet_delta_replaces_wholesale() {
        let mut state = AppState::default();
        state.apply_wallet_delta(WalletState {
            active: true,
            balance: Some(WalletBalance {
                available: 10,
                ..Default::default()
            }),
            transactions: vec![WalletTransaction {
                tx_id: "1".to_string(),
                ..Default::default()
            }],
        });

        let outcome = state.apply_wallet_delta(WalletState {
            active: true,
            ..Default::default()
        });

        assert_eq!(outcome, Outcome::Applied);
        assert!(state.wallet.balance.is_none());
        assert!(state.wallet.transactions.is_empty());
    }

    #[test]
    fn test_log_tail_is_bounded() {
        let mut state = AppState::new(3);
        for i in 0..5 {
            state.append_log(ContainerId::Wallet, format!("line {}", i));
        }

        let logs: Vec<_> = state
            .container(ContainerId::Wallet)
            .unwrap()
            .logs
            .iter()
            .cloned()
            .collect();
        assert_eq!(logs, vec!["line 2", "line 3", "line 4"]);
    }
}

mod store_tests {
    use super::*;

    #[tokio::test]
    async fn test_store_notifies_only_on_mutation() {
        let store = StateStore::default();
        let mut rx = store.watch();
        rx.borrow_and_update();

        store.apply_status_delta(ContainerId::Tor, TaskStatus::Inactive);
        assert!(!rx.has_changed().unwrap());

        store.apply_status_delta(ContainerId::Tor, TaskStatus::Active);
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update()
                .container(ContainerId::Tor)
                .unwrap()
                .status,
            TaskStatus::Active
        );
    }

    #[test]
    fn test_store_clones_share_state() {
        let store = StateStore::new(StoreConfig::default());
        let other = store.clone();

        other.apply_wallet_delta(WalletState {
            active: true,
            ..Default::default()
        });

        assert!(store.current().wallet.active);
        assert_eq!(store.read(|s| s.active_count()), 0);
    }

    #[test]
    fn test_state_serializes_containers_by_token() {
        let state = AppState::default();
        let json = serde_json::to_value(&state).unwrap();
        let containers = json["containers"].as_object().unwrap();

        assert_eq!(containers.len(), ContainerId::ALL.len());
        assert!(containers.contains_key("BaseNode"));
        assert!(!containers.contains_key("Base Node"));
        assert_eq!(containers["MmProxy"]["status"], json!("Inactive"));
    }
}
