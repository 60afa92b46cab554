// Library for tests to access modules

pub mod alert_engine;
pub mod classify;
pub mod config;
pub mod error;
pub mod fixture;
pub mod instance_class;
pub mod metrics_engine;
pub mod models;
pub mod orchestrator;
pub mod sources;
pub mod worker;
