// Background tasks: the refresh scheduler and the notification dispatcher.
// The scheduler runs refreshes inline in one loop, so timer and manual triggers never overlap.
// Alert events travel to a dedicated dispatcher task (channel) so delivery never blocks a refresh.

use crate::alert_engine::{AlertDecision, recovery_message};
use crate::orchestrator::{AlertEvent, Monitor};
use crate::sources::Notifier;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, interval};
use tracing::instrument;

/// Handle for requesting a manual refresh.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    tx: mpsc::Sender<()>,
    coalesced_total: Arc<AtomicU64>,
}

impl RefreshTrigger {
    /// Enqueues a refresh. Returns false when one is already pending (the request is coalesced)
    /// or the scheduler has stopped.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                self.coalesced_total.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Manual refresh requests waiting for the scheduler.
pub struct RefreshRequests {
    rx: mpsc::Receiver<()>,
    coalesced_total: Arc<AtomicU64>,
}

/// At most one manual request is queued at a time.
pub fn refresh_channel() -> (RefreshTrigger, RefreshRequests) {
    let (tx, rx) = mpsc::channel(1);
    let coalesced_total = Arc::new(AtomicU64::new(0));
    (
        RefreshTrigger {
            tx,
            coalesced_total: coalesced_total.clone(),
        },
        RefreshRequests {
            rx,
            coalesced_total,
        },
    )
}

pub struct SchedulerConfig {
    pub refresh_interval_secs: u64,
    /// How often to log refresh stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Spawns the scheduler. The first timer tick fires immediately, so a refresh runs at startup.
pub fn spawn(
    monitor: Arc<Monitor>,
    requests: RefreshRequests,
    config: SchedulerConfig,
    shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(monitor, requests, config, shutdown_rx).await;
    })
}

#[instrument(skip_all, fields(refresh_interval_secs = config.refresh_interval_secs))]
async fn run(
    monitor: Arc<Monitor>,
    requests: RefreshRequests,
    config: SchedulerConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let RefreshRequests {
        rx: mut requests_rx,
        coalesced_total,
    } = requests;

    let mut tick = interval(Duration::from_secs(config.refresh_interval_secs));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut stats_log_tick = interval(Duration::from_secs(config.stats_log_interval_secs));
    stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // Skip the immediate first tick so stats are not logged before any refresh.
    stats_log_tick.tick().await;

    let mut refreshes_total: u64 = 0;
    let mut manual_open = true;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                tracing::debug!("Scheduler shutting down");
                break;
            }
            _ = tick.tick() => {
                let state = monitor.refresh().await;
                refreshes_total += 1;
                tracing::debug!(trigger = "timer", ?state, "refresh finished");
            }
            request = requests_rx.recv(), if manual_open => {
                match request {
                    Some(()) => {
                        let state = monitor.refresh().await;
                        refreshes_total += 1;
                        tracing::debug!(trigger = "manual", ?state, "refresh finished");
                    }
                    None => manual_open = false,
                }
            }
            _ = stats_log_tick.tick() => {
                let active_alerts = monitor.active_alerts().await;
                tracing::info!(
                    refreshes_total,
                    triggers_coalesced_total = coalesced_total.load(Ordering::Relaxed),
                    active_alerts,
                    "monitor stats"
                );
            }
        }
    }
}

pub struct DispatcherConfig {
    pub notify_on_recovery: bool,
}

/// Spawns the task that turns alert events into notifier calls.
/// Delivery failures are logged and dropped. Exits when every sender is gone.
pub fn spawn_notification_dispatcher(
    mut events_rx: mpsc::Receiver<AlertEvent>,
    notifier: Arc<dyn Notifier>,
    config: DispatcherConfig,
    notifications_sent_total: Arc<AtomicU64>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let message = match event.decision {
                AlertDecision::Notify(message) => message,
                AlertDecision::Clear if config.notify_on_recovery => {
                    recovery_message(&event.instance_id)
                }
                AlertDecision::Clear | AlertDecision::Suppress => continue,
            };
            match notifier.notify(&message).await {
                Ok(()) => {
                    notifications_sent_total.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        operation = "notify",
                        instance_id = %event.instance_id,
                        "Notification delivered"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        operation = "notify",
                        instance_id = %event.instance_id,
                        "notification failed"
                    );
                }
            }
        }
        tracing::debug!("Notification dispatcher shutting down");
    })
}
