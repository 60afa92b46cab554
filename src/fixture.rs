// File-backed fleet: a JSON document standing in for the credential store, the instance
// lister and the metric fetcher. Re-read on every call so edits show up on the next refresh.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::CredentialError;
use crate::models::{EngineKind, Instance, MetricSample};
use crate::sources::{CredentialSource, Credentials, InstanceLister, MetricFetcher, MetricWindow};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetDocument {
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub instances: Vec<FixtureInstance>,
    /// When set, listing fails with this text.
    #[serde(default)]
    pub list_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureInstance {
    pub id: String,
    pub engine: EngineKind,
    pub instance_class: String,
    pub allocated_storage_gib: u64,
    #[serde(default = "default_status")]
    pub status: String,
    /// Listed in every region when absent.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub sample: MetricSample,
    /// When set, fetching this instance's metrics fails with this text.
    #[serde(default)]
    pub fetch_error: Option<String>,
}

fn default_status() -> String {
    "available".into()
}

impl FixtureInstance {
    fn to_instance(&self) -> Instance {
        Instance::new(
            &self.id,
            self.engine.clone(),
            &self.instance_class,
            self.allocated_storage_gib,
            &self.status,
        )
    }
}

#[derive(Debug, Clone)]
pub struct FixtureFleet {
    path: PathBuf,
}

impl FixtureFleet {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub async fn load(&self) -> anyhow::Result<FleetDocument> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read fleet file {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse fleet file {}", self.path.display()))
    }
}

fn is_missing_file(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

#[async_trait]
impl CredentialSource for FixtureFleet {
    async fn exists(&self) -> bool {
        match self.load().await {
            Ok(doc) => !doc.profiles.is_empty(),
            Err(e) if is_missing_file(&e) => {
                tracing::debug!(error = %e, operation = "credentials_exist", "fleet file not found");
                false
            }
            // Present but unreadable: let `resolve` report it as a credential failure.
            Err(e) => {
                tracing::warn!(error = %e, operation = "credentials_exist", "fleet file unreadable");
                true
            }
        }
    }

    async fn resolve(&self, profile: &str) -> Result<Credentials, CredentialError> {
        let doc = self.load().await.map_err(|e| CredentialError::Invalid {
            profile: profile.to_string(),
            reason: format!("{:#}", e),
        })?;
        if !doc.profiles.iter().any(|p| p == profile) {
            return Err(CredentialError::NotFound(profile.to_string()));
        }
        Ok(Credentials {
            profile: profile.to_string(),
            access_key_id: format!("fixture-{}", profile),
            secret_access_key: String::new(),
            session_token: None,
        })
    }
}

#[async_trait]
impl InstanceLister for FixtureFleet {
    async fn list(&self, region: &str, _credentials: &Credentials) -> anyhow::Result<Vec<Instance>> {
        let doc = self.load().await?;
        if let Some(text) = doc.list_error {
            anyhow::bail!("{}", text);
        }
        Ok(doc
            .instances
            .iter()
            .filter(|i| i.region.as_deref().is_none_or(|r| r == region))
            .map(FixtureInstance::to_instance)
            .collect())
    }
}

#[async_trait]
impl MetricFetcher for FixtureFleet {
    async fn fetch(
        &self,
        instance_id: &str,
        _window: &MetricWindow,
        _credentials: &Credentials,
    ) -> anyhow::Result<MetricSample> {
        let doc = self.load().await?;
        let instance = doc
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .with_context(|| format!("unknown instance {}", instance_id))?;
        if let Some(text) = &instance.fetch_error {
            anyhow::bail!("{}", text);
        }
        Ok(instance.sample)
    }
}
