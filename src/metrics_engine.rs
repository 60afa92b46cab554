// Raw samples + instance metadata -> normalized Metrics. Pure; no I/O.
//
// Missing CPU/connection samples read as idle (0). Missing storage reads as UNAVAILABLE:
// storage datapoints are sparse and a zero free-bytes reading cannot be told apart from no data.

use crate::models::{Instance, MetricSample, Metrics, UNAVAILABLE};

pub fn derive(sample: &MetricSample, instance: &Instance) -> Metrics {
    let cpu_utilization = sample.cpu_utilization.unwrap_or(0.0);
    let current_connections = sample.database_connections.unwrap_or(0.0);

    Metrics {
        cpu_utilization,
        current_connections,
        connections_used_percent: connections_used_percent(
            current_connections,
            instance.max_connections,
        ),
        storage_used_percent: storage_used_percent(
            sample.free_storage_space,
            instance.allocated_storage_bytes(),
        ),
        free_storage_space: sample.free_storage_space,
    }
}

/// 0 when the limit is unknown (0); otherwise clamped to [0, 100].
pub fn connections_used_percent(current_connections: f64, max_connections: u32) -> f64 {
    if max_connections == 0 {
        return 0.0;
    }
    clamp_percent(current_connections / f64::from(max_connections) * 100.0)
}

/// [`UNAVAILABLE`] unless both allocated bytes and a positive free-space reading exist.
pub fn storage_used_percent(free_storage_space: Option<f64>, allocated_storage_bytes: u64) -> f64 {
    let Some(free) = free_storage_space.filter(|f| *f > 0.0) else {
        return UNAVAILABLE;
    };
    if allocated_storage_bytes == 0 {
        return UNAVAILABLE;
    }
    let allocated = allocated_storage_bytes as f64;
    clamp_percent((allocated - free) / allocated * 100.0)
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
