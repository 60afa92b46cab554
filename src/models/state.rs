// Published monitoring state: one snapshot per refresh, replaced wholesale

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{Instance, Metrics};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum MonitoringState {
    Loading,
    Loaded,
    NoCredentials,
    InvalidCredentials(String),
    NoDatabases,
    Error(String),
}

impl MonitoringState {
    /// True for states that end a refresh cycle without data.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MonitoringState::NoCredentials
                | MonitoringState::InvalidCredentials(_)
                | MonitoringState::Error(_)
        )
    }
}

/// Everything the presentation layer reads after a refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub state: MonitoringState,
    pub instances: Arc<Vec<Instance>>,
    pub metrics: Arc<HashMap<String, Metrics>>,
    pub last_update_time: Option<DateTime<Utc>>,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            state: MonitoringState::Loading,
            instances: Arc::new(Vec::new()),
            metrics: Arc::new(HashMap::new()),
            last_update_time: None,
        }
    }
}

impl MonitorSnapshot {
    pub fn metrics_for(&self, instance_id: &str) -> Option<&Metrics> {
        self.metrics.get(instance_id)
    }
}
