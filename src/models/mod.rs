// Domain models: fleet instances, raw samples, derived metrics, published state

mod instance;
mod metrics;
mod state;

pub use instance::{EngineKind, Instance};
pub use metrics::{MetricSample, Metrics, UNAVAILABLE};
pub use state::{MonitorSnapshot, MonitoringState};
