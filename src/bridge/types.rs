//! View models for the bridge's JSON replies.
//!
//! Every field defaults when absent so a bridge that adds or drops fields
//! never turns into a decode error on this side.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// `null` decodes like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reply of `POST /autonomous/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentStatusReport {
    #[serde(deserialize_with = "null_as_default")]
    pub running: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub paused: bool,
    pub uptime: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub cycle_count: u64,
    /// Keyed by agent id; ordered so the rendered table is stable.
    #[serde(deserialize_with = "null_as_default")]
    pub agents: BTreeMap<String, AgentInfo>,
    #[serde(deserialize_with = "null_as_default")]
    pub tasks_pending: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub tasks_in_progress: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub tasks_completed: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub tasks_failed: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub build_history: Vec<BuildRecord>,
}

impl AgentStatusReport {
    /// Short state word for the status line.
    pub fn state_label(&self) -> &'static str {
        match (self.running, self.paused) {
            (true, true) => "PAUSED",
            (true, false) => "RUNNING",
            (false, _) => "STOPPED",
        }
    }

    /// Most recent `n` builds, oldest first.
    pub fn recent_builds(&self, n: usize) -> &[BuildRecord] {
        let start = self.build_history.len().saturating_sub(n);
        &self.build_history[start..]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentInfo {
    pub name: String,
    pub role: String,
    pub provider: String,
    pub status: String,
    pub tasks_completed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildRecord {
    pub build_type: String,
    pub success: bool,
    pub duration_seconds: f64,
    pub timestamp: String,
}

/// Entry of `GET /devices`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceInfo {
    #[serde(alias = "device_id")]
    pub id: String,
    #[serde(alias = "device_name")]
    pub name: String,
    pub platform: Option<String>,
    pub connected: Option<bool>,
}

/// Accept either a bare array or `{"devices": [...]}`.
pub fn parse_devices(value: &serde_json::Value) -> Vec<DeviceInfo> {
    let list = match value {
        serde_json::Value::Array(_) => value,
        other => match other.get("devices") {
            Some(inner) => inner,
            None => return Vec::new(),
        },
    };
    serde_json::from_value(list.clone()).unwrap_or_else(|e| {
        tracing::warn!("unexpected /devices shape: {e}");
        Vec::new()
    })
}
