// Shared test helpers: stub collaborators and builders
#![allow(dead_code)]

use async_trait::async_trait;
use dbwatch::alert_engine::AlertPolicy;
use dbwatch::error::CredentialError;
use dbwatch::models::*;
use dbwatch::orchestrator::{AlertEvent, Monitor, MonitorDeps, MonitorSettings};
use dbwatch::sources::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub fn instance(id: &str) -> Instance {
    // db.t3.micro on Postgres: 112 connections, 20 GiB storage
    Instance::new(id, EngineKind::Postgres, "db.t3.micro", 20, "available")
}

pub fn sample(cpu: f64, connections: f64, free_storage: Option<f64>) -> MetricSample {
    MetricSample {
        cpu_utilization: Some(cpu),
        database_connections: Some(connections),
        free_storage_space: free_storage,
    }
}

pub fn busy_sample() -> MetricSample {
    sample(90.0, 1.0, None)
}

pub fn idle_sample() -> MetricSample {
    sample(5.0, 1.0, None)
}

pub struct StubCredentials {
    pub exists: bool,
    pub resolve_error: Option<String>,
}

impl StubCredentials {
    pub fn valid() -> Self {
        Self {
            exists: true,
            resolve_error: None,
        }
    }
}

#[async_trait]
impl CredentialSource for StubCredentials {
    async fn exists(&self) -> bool {
        self.exists
    }

    async fn resolve(&self, profile: &str) -> Result<Credentials, CredentialError> {
        if let Some(reason) = &self.resolve_error {
            return Err(CredentialError::Invalid {
                profile: profile.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(Credentials {
            profile: profile.to_string(),
            access_key_id: "test".into(),
            secret_access_key: "test".into(),
            session_token: None,
        })
    }
}

/// Lister whose result can be swapped between refreshes.
#[derive(Default)]
pub struct StubLister {
    result: Mutex<Option<Result<Vec<Instance>, String>>>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    delay_ms: u64,
}

impl StubLister {
    pub fn returning(instances: Vec<Instance>) -> Self {
        let lister = Self::default();
        lister.set_instances(instances);
        lister
    }

    pub fn failing(text: &str) -> Self {
        let lister = Self::default();
        *lister.result.lock().unwrap() = Some(Err(text.to_string()));
        lister
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn set_instances(&self, instances: Vec<Instance>) {
        *self.result.lock().unwrap() = Some(Ok(instances));
    }

    pub fn set_error(&self, text: &str) {
        *self.result.lock().unwrap() = Some(Err(text.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceLister for StubLister {
    async fn list(&self, _region: &str, _credentials: &Credentials) -> anyhow::Result<Vec<Instance>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.result.lock().unwrap().clone() {
            Some(Ok(instances)) => Ok(instances),
            Some(Err(text)) => Err(anyhow::anyhow!(text)),
            None => Ok(Vec::new()),
        }
    }
}

/// Fetcher keyed by instance id; ids in `failing` return an error.
#[derive(Default)]
pub struct StubFetcher {
    samples: Mutex<HashMap<String, MetricSample>>,
    failing: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn set_sample(&self, id: &str, sample: MetricSample) {
        self.samples.lock().unwrap().insert(id.to_string(), sample);
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn recover(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }
}

#[async_trait]
impl MetricFetcher for StubFetcher {
    async fn fetch(
        &self,
        instance_id: &str,
        _window: &MetricWindow,
        _credentials: &Credentials,
    ) -> anyhow::Result<MetricSample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(instance_id) {
            anyhow::bail!("GetMetricData timed out for {}", instance_id);
        }
        Ok(self
            .samples
            .lock()
            .unwrap()
            .get(instance_id)
            .copied()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            anyhow::bail!("notification center unavailable");
        }
        Ok(())
    }
}

pub struct Harness {
    pub monitor: Monitor,
    pub lister: Arc<StubLister>,
    pub fetcher: Arc<StubFetcher>,
    pub alerts_rx: mpsc::Receiver<AlertEvent>,
}

pub fn harness(credentials: StubCredentials, lister: StubLister) -> Harness {
    harness_with_capacity(credentials, lister, 64)
}

/// Harness whose alert channel holds at most `capacity` undelivered events.
pub fn harness_with_capacity(
    credentials: StubCredentials,
    lister: StubLister,
    capacity: usize,
) -> Harness {
    let lister = Arc::new(lister);
    let fetcher = Arc::new(StubFetcher::default());
    let (alerts_tx, alerts_rx) = mpsc::channel(capacity);
    let monitor = Monitor::new(
        MonitorDeps {
            credentials: Arc::new(credentials),
            lister: lister.clone(),
            fetcher: fetcher.clone(),
            alerts_tx,
        },
        MonitorSettings::new("default", "us-east-1"),
        AlertPolicy::default(),
    );
    Harness {
        monitor,
        lister,
        fetcher,
        alerts_rx,
    }
}

pub fn drain(rx: &mut mpsc::Receiver<AlertEvent>) -> Vec<AlertEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
