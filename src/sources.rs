// Injected collaborators: credentials, fleet listing, metric reads, notification delivery.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::CredentialError;
use crate::models::{Instance, MetricSample};

pub const DEFAULT_LOOKBACK_SECS: i64 = 3600;
/// Aggregation period for CPU and connection readings.
pub const DEFAULT_ACTIVITY_PERIOD_SECS: u32 = 300;
/// Storage datapoints arrive far less often, so they aggregate over a wider period.
pub const DEFAULT_STORAGE_PERIOD_SECS: u32 = 3600;

/// Resolved credentials for one refresh cycle. Never cached past it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub profile: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("profile", &self.profile)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Lookback window for one fetch, anchored at the cycle start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricWindow {
    pub end: DateTime<Utc>,
    pub lookback: Duration,
    pub activity_period_secs: u32,
    pub storage_period_secs: u32,
}

impl MetricWindow {
    pub fn ending_at(end: DateTime<Utc>) -> Self {
        Self {
            end,
            lookback: Duration::seconds(DEFAULT_LOOKBACK_SECS),
            activity_period_secs: DEFAULT_ACTIVITY_PERIOD_SECS,
            storage_period_secs: DEFAULT_STORAGE_PERIOD_SECS,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.end - self.lookback
    }
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Whether any credentials source exists at all.
    async fn exists(&self) -> bool;

    async fn resolve(&self, profile: &str) -> Result<Credentials, CredentialError>;
}

#[async_trait]
pub trait InstanceLister: Send + Sync {
    async fn list(&self, region: &str, credentials: &Credentials) -> anyhow::Result<Vec<Instance>>;
}

#[async_trait]
pub trait MetricFetcher: Send + Sync {
    async fn fetch(
        &self,
        instance_id: &str,
        window: &MetricWindow,
        credentials: &Credentials,
    ) -> anyhow::Result<MetricSample>;
}

/// Fire-and-forget delivery. Errors are logged by the caller and never propagate.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> anyhow::Result<()>;
}

/// Delivers notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        tracing::info!(operation = "notify", %message, "notification");
        Ok(())
    }
}
