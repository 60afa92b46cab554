// One refresh cycle: credentials -> list -> fetch (concurrent) -> derive -> alert -> publish.
// The alert engine lock is held for the whole cycle, so refreshes never overlap.

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::alert_engine::{AlertDecision, AlertEngine, AlertPolicy};
use crate::classify::{self, AuthErrorMatcher};
use crate::error::MonitorError;
use crate::metrics_engine;
use crate::models::{Instance, Metrics, MonitorSnapshot, MonitoringState};
use crate::sources::{
    CredentialSource, Credentials, DEFAULT_ACTIVITY_PERIOD_SECS, DEFAULT_LOOKBACK_SECS,
    DEFAULT_STORAGE_PERIOD_SECS, InstanceLister, MetricFetcher, MetricWindow,
};

/// A Notify or Clear decision on its way to the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub instance_id: String,
    pub decision: AlertDecision,
}

/// Collaborators and the outbound alert channel.
pub struct MonitorDeps {
    pub credentials: Arc<dyn CredentialSource>,
    pub lister: Arc<dyn InstanceLister>,
    pub fetcher: Arc<dyn MetricFetcher>,
    pub alerts_tx: mpsc::Sender<AlertEvent>,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub profile: String,
    pub region: String,
    pub lookback: Duration,
    pub activity_period_secs: u32,
    pub storage_period_secs: u32,
}

impl MonitorSettings {
    pub fn new(profile: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            region: region.into(),
            lookback: Duration::seconds(DEFAULT_LOOKBACK_SECS),
            activity_period_secs: DEFAULT_ACTIVITY_PERIOD_SECS,
            storage_period_secs: DEFAULT_STORAGE_PERIOD_SECS,
        }
    }

    fn window(&self) -> MetricWindow {
        MetricWindow {
            lookback: self.lookback,
            activity_period_secs: self.activity_period_secs,
            storage_period_secs: self.storage_period_secs,
            ..MetricWindow::ending_at(Utc::now())
        }
    }
}

pub struct Monitor {
    credentials: Arc<dyn CredentialSource>,
    lister: Arc<dyn InstanceLister>,
    fetcher: Arc<dyn MetricFetcher>,
    alerts_tx: mpsc::Sender<AlertEvent>,
    settings: MonitorSettings,
    auth_matcher: AuthErrorMatcher,
    alert_engine: Mutex<AlertEngine>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
}

impl Monitor {
    pub fn new(deps: MonitorDeps, settings: MonitorSettings, policy: AlertPolicy) -> Self {
        let MonitorDeps {
            credentials,
            lister,
            fetcher,
            alerts_tx,
        } = deps;
        let (snapshot_tx, _) = watch::channel(MonitorSnapshot::default());
        Self {
            credentials,
            lister,
            fetcher,
            alerts_tx,
            settings,
            auth_matcher: classify::is_auth_error,
            alert_engine: Mutex::new(AlertEngine::new(policy)),
            snapshot_tx,
        }
    }

    /// Replace the listing-error matcher (e.g. with one backed by structured error codes).
    pub fn with_auth_matcher(mut self, matcher: AuthErrorMatcher) -> Self {
        self.auth_matcher = matcher;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn state(&self) -> MonitoringState {
        self.snapshot_tx.borrow().state.clone()
    }

    pub fn metrics_for(&self, instance_id: &str) -> Option<Metrics> {
        self.snapshot_tx.borrow().metrics_for(instance_id).copied()
    }

    pub fn last_update_time(&self) -> Option<chrono::DateTime<Utc>> {
        self.snapshot_tx.borrow().last_update_time
    }

    pub async fn active_alerts(&self) -> usize {
        self.alert_engine.lock().await.active_alerts()
    }

    /// Runs one cycle and returns the state it published. Concurrent callers queue.
    #[instrument(skip(self), fields(profile = %self.settings.profile, region = %self.settings.region))]
    pub async fn refresh(&self) -> MonitoringState {
        let mut engine = self.alert_engine.lock().await;
        self.snapshot_tx
            .send_modify(|snap| snap.state = MonitoringState::Loading);

        let state = match self.run_cycle(&mut engine).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, operation = "refresh", "refresh failed");
                e.into()
            }
        };

        let completed_at = Utc::now();
        self.snapshot_tx.send_modify(|snap| {
            match &state {
                MonitoringState::Loaded | MonitoringState::NoDatabases => {
                    snap.last_update_time = Some(completed_at);
                }
                _ => {
                    snap.instances = Arc::new(Vec::new());
                    snap.metrics = Arc::new(HashMap::new());
                }
            }
            snap.state = state.clone();
        });
        state
    }

    async fn run_cycle(&self, engine: &mut AlertEngine) -> Result<MonitoringState, MonitorError> {
        if !self.credentials.exists().await {
            return Err(MonitorError::CredentialsMissing);
        }
        let credentials = self
            .credentials
            .resolve(&self.settings.profile)
            .await
            .map_err(|e| MonitorError::CredentialsInvalid(e.to_string()))?;

        let instances = self
            .lister
            .list(&self.settings.region, &credentials)
            .await
            .map_err(|e| classify::classify_listing_error(&e, self.auth_matcher))?;

        let pruned = {
            let listed: HashSet<&str> = instances.iter().map(|i| i.id.as_str()).collect();
            engine.retain_instances(&listed)
        };
        if pruned > 0 {
            debug!(pruned, "dropped alert records for instances no longer listed");
        }

        if instances.is_empty() {
            self.snapshot_tx.send_modify(|snap| {
                snap.instances = Arc::new(Vec::new());
                snap.metrics = Arc::new(HashMap::new());
            });
            info!(operation = "list_instances", "no databases in region");
            return Ok(MonitoringState::NoDatabases);
        }

        let instances = Arc::new(instances);
        self.snapshot_tx
            .send_modify(|snap| snap.instances = instances.clone());

        let metrics = Arc::new(self.fetch_all(&instances, &credentials).await);
        self.snapshot_tx
            .send_modify(|snap| snap.metrics = metrics.clone());

        let mut decisions = 0usize;
        for instance in instances.iter() {
            // No metrics this cycle means no evaluation, not an all-unavailable evaluation.
            let Some(m) = metrics.get(&instance.id) else {
                continue;
            };
            let decision = engine.evaluate(&instance.id, m, instance.max_connections);
            if decision == AlertDecision::Suppress {
                continue;
            }
            decisions += 1;
            let event = AlertEvent {
                instance_id: instance.id.clone(),
                decision,
            };
            match self.alerts_tx.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    warn!(
                        operation = "dispatch_alert",
                        instance_id = %event.instance_id,
                        "notification queue full; alert event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(operation = "dispatch_alert", "notification channel closed");
                }
            }
        }

        info!(
            instances = instances.len(),
            metrics = metrics.len(),
            decisions,
            active_alerts = engine.active_alerts(),
            "refresh complete"
        );
        Ok(MonitoringState::Loaded)
    }

    /// Fetches every instance concurrently; failures are logged and left out of the map.
    async fn fetch_all(
        &self,
        instances: &[Instance],
        credentials: &Credentials,
    ) -> HashMap<String, Metrics> {
        let window = self.settings.window();
        let fetches = instances.iter().map(|instance| {
            let window = &window;
            async move {
                let result = self.fetcher.fetch(&instance.id, window, credentials).await;
                (instance, result)
            }
        });

        let mut metrics = HashMap::with_capacity(instances.len());
        for (instance, result) in join_all(fetches).await {
            match result {
                Ok(sample) => {
                    metrics.insert(
                        instance.id.clone(),
                        metrics_engine::derive(&sample, instance),
                    );
                }
                Err(source) => {
                    let e = MonitorError::MetricFetch {
                        instance_id: instance.id.clone(),
                        source,
                    };
                    warn!(
                        error = %e,
                        instance_id = %instance.id,
                        operation = "fetch_metrics",
                        "metric fetch failed; instance skipped this cycle"
                    );
                }
            }
        }
        metrics
    }
}
