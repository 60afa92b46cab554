// Refresh failure taxonomy

use thiserror::Error;

use crate::models::MonitoringState;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credentials found for profile '{0}'")]
    NotFound(String),
    #[error("invalid credentials for profile '{profile}': {reason}")]
    Invalid { profile: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("no credentials source configured")]
    CredentialsMissing,
    #[error("{0}")]
    CredentialsInvalid(String),
    /// Recovered locally: the instance is left out of this cycle.
    #[error("metric fetch failed for {instance_id}: {source:#}")]
    MetricFetch {
        instance_id: String,
        source: anyhow::Error,
    },
    #[error("{0}")]
    Unclassified(String),
}

impl From<MonitorError> for MonitoringState {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::CredentialsMissing => MonitoringState::NoCredentials,
            MonitorError::CredentialsInvalid(reason) => MonitoringState::InvalidCredentials(reason),
            other => MonitoringState::Error(other.to_string()),
        }
    }
}
