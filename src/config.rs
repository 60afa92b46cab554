use serde::Deserialize;

use crate::alert_engine::{AlertPolicy, DEFAULT_RENOTIFY_AFTER_SECS, DEFAULT_THRESHOLD_PERCENT};
use crate::orchestrator::MonitorSettings;
use crate::sources::{
    DEFAULT_ACTIVITY_PERIOD_SECS, DEFAULT_LOOKBACK_SECS, DEFAULT_STORAGE_PERIOD_SECS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub account: AccountConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// File-backed fleet used in place of a live provider.
    pub fixture: Option<FixtureConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub profile: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub refresh_interval_secs: u64,
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: i64,
    /// Aggregation period for CPU and connection readings.
    #[serde(default = "default_activity_period_secs")]
    pub activity_period_secs: u32,
    /// Aggregation period for free storage readings.
    #[serde(default = "default_storage_period_secs")]
    pub storage_period_secs: u32,
    /// How often the scheduler logs refresh stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_lookback_secs() -> i64 {
    DEFAULT_LOOKBACK_SECS
}

fn default_activity_period_secs() -> u32 {
    DEFAULT_ACTIVITY_PERIOD_SECS
}

fn default_storage_period_secs() -> u32 {
    DEFAULT_STORAGE_PERIOD_SECS
}

fn default_stats_log_interval_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: f64,
    /// Minimum gap before an unchanged breach is announced again.
    #[serde(default = "default_renotify_after_secs")]
    pub renotify_after_secs: i64,
    #[serde(default = "default_true")]
    pub notify_on_recovery: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            threshold_percent: default_threshold_percent(),
            renotify_after_secs: default_renotify_after_secs(),
            notify_on_recovery: true,
        }
    }
}

fn default_threshold_percent() -> f64 {
    DEFAULT_THRESHOLD_PERCENT
}

fn default_renotify_after_secs() -> i64 {
    DEFAULT_RENOTIFY_AFTER_SECS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Pending alert events buffered between the monitor and the notifier.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureConfig {
    pub path: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            lookback: chrono::Duration::seconds(self.monitoring.lookback_secs),
            activity_period_secs: self.monitoring.activity_period_secs,
            storage_period_secs: self.monitoring.storage_period_secs,
            ..MonitorSettings::new(&self.account.profile, &self.account.region)
        }
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            threshold_percent: self.alerts.threshold_percent,
            renotify_after: chrono::Duration::seconds(self.alerts.renotify_after_secs),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.account.profile.trim().is_empty(),
            "account.profile must be non-empty"
        );
        anyhow::ensure!(
            !self.account.region.trim().is_empty(),
            "account.region must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.refresh_interval_secs > 0,
            "monitoring.refresh_interval_secs must be > 0, got {}",
            self.monitoring.refresh_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.lookback_secs > 0,
            "monitoring.lookback_secs must be > 0, got {}",
            self.monitoring.lookback_secs
        );
        anyhow::ensure!(
            self.monitoring.activity_period_secs > 0,
            "monitoring.activity_period_secs must be > 0, got {}",
            self.monitoring.activity_period_secs
        );
        anyhow::ensure!(
            self.monitoring.storage_period_secs > 0,
            "monitoring.storage_period_secs must be > 0, got {}",
            self.monitoring.storage_period_secs
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.alerts.threshold_percent > 0.0 && self.alerts.threshold_percent <= 100.0,
            "alerts.threshold_percent must be in (0, 100], got {}",
            self.alerts.threshold_percent
        );
        anyhow::ensure!(
            self.alerts.renotify_after_secs > 0,
            "alerts.renotify_after_secs must be > 0, got {}",
            self.alerts.renotify_after_secs
        );
        anyhow::ensure!(
            self.notifications.channel_capacity > 0,
            "notifications.channel_capacity must be > 0, got {}",
            self.notifications.channel_capacity
        );
        if let Some(fixture) = &self.fixture {
            anyhow::ensure!(!fixture.path.is_empty(), "fixture.path must be non-empty");
        }
        Ok(())
    }
}
