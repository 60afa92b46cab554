// Per-instance alert lifecycle: notify on new or changed breaches, re-notify after the
// dedup window, clear on recovery.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::models::{Metrics, UNAVAILABLE};

pub const DEFAULT_THRESHOLD_PERCENT: f64 = 50.0;
pub const DEFAULT_RENOTIFY_AFTER_SECS: i64 = 900;

/// Percentage metrics that can breach. Ordering fixes message line order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BreachMetric {
    Cpu,
    Connections,
    Storage,
}

impl BreachMetric {
    pub fn label(self) -> &'static str {
        match self {
            BreachMetric::Cpu => "CPU",
            BreachMetric::Connections => "Connections",
            BreachMetric::Storage => "Storage",
        }
    }

    fn value(self, metrics: &Metrics) -> f64 {
        match self {
            BreachMetric::Cpu => metrics.cpu_utilization,
            BreachMetric::Connections => metrics.connections_used_percent,
            BreachMetric::Storage => metrics.storage_used_percent,
        }
    }

    const ALL: [BreachMetric; 3] = [
        BreachMetric::Cpu,
        BreachMetric::Connections,
        BreachMetric::Storage,
    ];
}

impl fmt::Display for BreachMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    Suppress,
    Notify(String),
    Clear,
}

/// Present only while the instance is breaching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub breaching: BTreeSet<BreachMetric>,
    pub last_notified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertPolicy {
    /// A metric breaches when strictly above this value.
    pub threshold_percent: f64,
    /// Unchanged breaches re-notify once strictly more than this has elapsed.
    pub renotify_after: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            renotify_after: Duration::seconds(DEFAULT_RENOTIFY_AFTER_SECS),
        }
    }
}

#[derive(Debug, Default)]
pub struct AlertEngine {
    policy: AlertPolicy,
    records: HashMap<String, AlertRecord>,
}

impl AlertEngine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            records: HashMap::new(),
        }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    pub fn evaluate(
        &mut self,
        instance_id: &str,
        metrics: &Metrics,
        max_connections: u32,
    ) -> AlertDecision {
        self.evaluate_at(instance_id, metrics, max_connections, Utc::now())
    }

    pub fn evaluate_at(
        &mut self,
        instance_id: &str,
        metrics: &Metrics,
        max_connections: u32,
        now: DateTime<Utc>,
    ) -> AlertDecision {
        let breaching = self.breaching_set(metrics);
        let any_breach = !breaching.is_empty() || self.activity_breach(metrics, max_connections);

        if !any_breach {
            return match self.records.remove(instance_id) {
                Some(_) => AlertDecision::Clear,
                None => AlertDecision::Suppress,
            };
        }

        match self.records.get_mut(instance_id) {
            None => {
                let message = alert_message(instance_id, metrics, &breaching);
                self.records.insert(
                    instance_id.to_string(),
                    AlertRecord {
                        breaching,
                        last_notified_at: now,
                    },
                );
                AlertDecision::Notify(message)
            }
            Some(record) if record.breaching != breaching => {
                let message = alert_message(instance_id, metrics, &breaching);
                record.breaching = breaching;
                record.last_notified_at = now;
                AlertDecision::Notify(message)
            }
            Some(record) if now - record.last_notified_at > self.policy.renotify_after => {
                record.last_notified_at = now;
                AlertDecision::Notify(alert_message(instance_id, metrics, &breaching))
            }
            Some(_) => AlertDecision::Suppress,
        }
    }

    pub fn record(&self, instance_id: &str) -> Option<&AlertRecord> {
        self.records.get(instance_id)
    }

    pub fn active_alerts(&self) -> usize {
        self.records.len()
    }

    /// Drops records for instances no longer in the fleet. Returns how many were dropped.
    pub fn retain_instances(&mut self, listed: &HashSet<&str>) -> usize {
        let before = self.records.len();
        self.records.retain(|id, _| listed.contains(id.as_str()));
        before - self.records.len()
    }

    fn breaching_set(&self, metrics: &Metrics) -> BTreeSet<BreachMetric> {
        BreachMetric::ALL
            .into_iter()
            .filter(|m| self.breaches(m.value(metrics)))
            .collect()
    }

    // Coarser second check over the raw connection ratio; evaluated alongside the
    // connections percentage, never merged with it.
    fn activity_breach(&self, metrics: &Metrics, max_connections: u32) -> bool {
        if max_connections == 0 {
            return false;
        }
        metrics.current_connections / f64::from(max_connections) * 100.0
            > self.policy.threshold_percent
    }

    fn breaches(&self, value: f64) -> bool {
        value != UNAVAILABLE && value > self.policy.threshold_percent
    }
}

/// Header naming the instance, then one `"{Label}: {n}%"` line per breaching metric.
pub fn alert_message(
    instance_id: &str,
    metrics: &Metrics,
    breaching: &BTreeSet<BreachMetric>,
) -> String {
    let mut lines = Vec::with_capacity(breaching.len() + 1);
    lines.push(format!("Database alert: {}", instance_id));
    for metric in breaching {
        lines.push(format!(
            "{}: {}%",
            metric.label(),
            metric.value(metrics).round() as i64
        ));
    }
    lines.join("\n")
}

pub fn recovery_message(instance_id: &str) -> String {
    format!("Database recovered: {}", instance_id)
}
