// Raw per-instance readings and the percentages derived from them

use serde::{Deserialize, Serialize};

/// Marker for a derived percentage with no usable data this cycle. Distinct from 0.
pub const UNAVAILABLE: f64 = -1.0;

/// Readings returned by the metric fetcher. Each field is absent when no datapoint came back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    #[serde(default)]
    pub cpu_utilization: Option<f64>,
    #[serde(default)]
    pub database_connections: Option<f64>,
    /// Bytes.
    #[serde(default)]
    pub free_storage_space: Option<f64>,
}

/// Derived view of one instance. Percentages are in [0, 100] or exactly [`UNAVAILABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub cpu_utilization: f64,
    pub current_connections: f64,
    pub connections_used_percent: f64,
    pub storage_used_percent: f64,
    /// Bytes; `None` when storage was not observed this cycle.
    pub free_storage_space: Option<f64>,
}

impl Metrics {
    /// Storage percentage, or `None` for the sentinel.
    pub fn storage_used(&self) -> Option<f64> {
        (self.storage_used_percent != UNAVAILABLE).then_some(self.storage_used_percent)
    }
}
