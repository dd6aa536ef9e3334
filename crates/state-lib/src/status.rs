//! Container lifecycle status and its wire normalizer
//!
//! The host sends the same logical status in several shapes:
//! - plain strings: `"Pending"`
//! - externally tagged objects: `{"Progress": {"pct": 40, "stage": "Pulling"}}`, `{"Failed": "oom"}`
//! - internally tagged objects: `{"type": "Progress", "pct": 40}` (or keyed by `status`)
//!
//! [`TaskStatus::normalize`] folds all of them into one enum at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::IngestError;

/// Progress descriptor carried by [`TaskStatus::Progress`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub pct: u8,
    pub stage: String,
}

/// Lifecycle status of one container
///
/// No transition order is enforced; the last status received wins.
/// `Failed` is retryable: a later `Pending` replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Inactive,
    Pending,
    Progress(TaskProgress),
    Active,
    Failed(String),
}

impl TaskStatus {
    /// Normalize any accepted wire shape into a status
    pub fn normalize(value: &Value) -> Result<Self, IngestError> {
        match value {
            Value::String(tag) => Self::from_tag(tag, None),
            Value::Object(map) => Self::from_object(map),
            other => Err(IngestError::InvalidStatus(other.to_string())),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Result<Self, IngestError> {
        // Internally tagged: {"type": "Progress", "pct": 10, "stage": "..."}
        for key in ["type", "status"] {
            if let Some(Value::String(tag)) = map.get(key) {
                return Self::from_tag(tag, Some(&Value::Object(map.clone())));
            }
        }

        // Externally tagged: {"Progress": {...}}
        if map.len() == 1 {
            if let Some((tag, body)) = map.iter().next() {
                return Self::from_tag(tag, Some(body));
            }
        }

        Err(IngestError::InvalidStatus(Value::Object(map.clone()).to_string()))
    }

    fn from_tag(tag: &str, body: Option<&Value>) -> Result<Self, IngestError> {
        match tag.to_ascii_lowercase().as_str() {
            "inactive" => Ok(TaskStatus::Inactive),
            "pending" => Ok(TaskStatus::Pending),
            "active" => Ok(TaskStatus::Active),
            "progress" => Ok(TaskStatus::Progress(parse_progress(body))),
            "failed" => Ok(TaskStatus::Failed(parse_reason(body))),
            _ => Err(IngestError::InvalidStatus(tag.to_string())),
        }
    }

    /// Short lowercase label, stable across payload shapes
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Inactive => "inactive",
            TaskStatus::Pending => "pending",
            TaskStatus::Progress(_) => "progress",
            TaskStatus::Active => "active",
            TaskStatus::Failed(_) => "failed",
        }
    }

    pub fn progress(&self) -> Option<&TaskProgress> {
        match self {
            TaskStatus::Progress(progress) => Some(progress),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Active)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Progress(p) if p.stage.is_empty() => write!(f, "progress {}%", p.pct),
            TaskStatus::Progress(p) => write!(f, "progress {}% ({})", p.pct, p.stage),
            TaskStatus::Failed(reason) if reason.is_empty() => f.write_str("failed"),
            TaskStatus::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

fn parse_progress(body: Option<&Value>) -> TaskProgress {
    let Some(Value::Object(map)) = body else {
        // Bare numbers are treated as the percentage
        let pct = body.and_then(Value::as_f64).map(clamp_pct).unwrap_or(0);
        return TaskProgress {
            pct,
            stage: String::new(),
        };
    };

    TaskProgress {
        pct: map.get("pct").and_then(Value::as_f64).map(clamp_pct).unwrap_or(0),
        stage: map
            .get("stage")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

fn parse_reason(body: Option<&Value>) -> String {
    match body {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(reason)) => reason.clone(),
        Some(Value::Object(map)) => ["reason", "error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(other) => other.to_string(),
    }
}

fn clamp_pct(pct: f64) -> u8 {
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_strings() {
        assert_eq!(TaskStatus::normalize(&json!("Pending")).unwrap(), TaskStatus::Pending);
        assert_eq!(TaskStatus::normalize(&json!("active")).unwrap(), TaskStatus::Active);
        assert_eq!(
            TaskStatus::normalize(&json!("Failed")).unwrap(),
            TaskStatus::Failed(String::new())
        );
        assert_eq!(
            TaskStatus::normalize(&json!("Progress")).unwrap(),
            TaskStatus::Progress(TaskProgress::default())
        );
    }

    #[test]
    fn test_externally_tagged() {
        let status =
            TaskStatus::normalize(&json!({"Progress": {"pct": 40, "stage": "Pulling image"}}))
                .unwrap();
        assert_eq!(
            status,
            TaskStatus::Progress(TaskProgress {
                pct: 40,
                stage: "Pulling image".to_string()
            })
        );

        let failed = TaskStatus::normalize(&json!({"Failed": "port in use"})).unwrap();
        assert_eq!(failed, TaskStatus::Failed("port in use".to_string()));

        let active = TaskStatus::normalize(&json!({"Active": null})).unwrap();
        assert_eq!(active, TaskStatus::Active);
    }

    #[test]
    fn test_internally_tagged() {
        let status = TaskStatus::normalize(&json!({"type": "Progress", "pct": 99.6})).unwrap();
        assert_eq!(status.progress().unwrap().pct, 100);

        let failed =
            TaskStatus::normalize(&json!({"status": "Failed", "error": "exit 137"})).unwrap();
        assert_eq!(failed, TaskStatus::Failed("exit 137".to_string()));
    }

    #[test]
    fn test_progress_pct_is_clamped() {
        let status = TaskStatus::normalize(&json!({"Progress": {"pct": 250}})).unwrap();
        assert_eq!(status.progress().unwrap().pct, 100);

        let status = TaskStatus::normalize(&json!({"Progress": -3})).unwrap();
        assert_eq!(status.progress().unwrap().pct, 0);
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        assert!(TaskStatus::normalize(&json!("Exploded")).is_err());
        assert!(TaskStatus::normalize(&json!(42)).is_err());
        assert!(TaskStatus::normalize(&json!({"a": 1, "b": 2})).is_err());
        assert!(TaskStatus::normalize(&json!(null)).is_err());
    }

    #[test]
    fn test_display() {
        let status = TaskStatus::Progress(TaskProgress {
            pct: 12,
            stage: "Syncing".to_string(),
        });
        assert_eq!(status.to_string(), "progress 12% (Syncing)");
        assert_eq!(TaskStatus::Failed("boom".into()).to_string(), "failed: boom");
        assert_eq!(TaskStatus::Inactive.to_string(), "inactive");
    }
}
