use anyhow::Result;
use dbwatch::*;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let fixture = app_config
        .fixture
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no fleet source configured; set [fixture] path"))?;
    let fleet = Arc::new(fixture::FixtureFleet::new(&fixture.path));

    let (alerts_tx, alerts_rx) =
        mpsc::channel::<orchestrator::AlertEvent>(app_config.notifications.channel_capacity);
    let notifications_sent_total = Arc::new(AtomicU64::new(0));
    let dispatcher_handle = worker::spawn_notification_dispatcher(
        alerts_rx,
        Arc::new(sources::LogNotifier),
        worker::DispatcherConfig {
            notify_on_recovery: app_config.alerts.notify_on_recovery,
        },
        notifications_sent_total.clone(),
    );

    let monitor = Arc::new(orchestrator::Monitor::new(
        orchestrator::MonitorDeps {
            credentials: fleet.clone(),
            lister: fleet.clone(),
            fetcher: fleet,
            alerts_tx,
        },
        app_config.monitor_settings(),
        app_config.alert_policy(),
    ));

    let mut snapshots = monitor.subscribe();
    tokio::spawn(async move {
        let mut last_state = None;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if last_state.as_ref() != Some(&snapshot.state) {
                tracing::info!(
                    state = ?snapshot.state,
                    instances = snapshot.instances.len(),
                    "monitoring state changed"
                );
                last_state = Some(snapshot.state);
            }
        }
    });

    let (_trigger, requests) = worker::refresh_channel();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let scheduler_handle = worker::spawn(
        monitor.clone(),
        requests,
        worker::SchedulerConfig {
            refresh_interval_secs: app_config.monitoring.refresh_interval_secs,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
        shutdown_rx,
    );
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        profile = %app_config.account.profile,
        region = %app_config.account.region,
        "dbwatch started"
    );

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let _ = scheduler_handle.await;
    // The monitor owns the last alert sender; dropping it lets the dispatcher drain and exit.
    drop(monitor);
    let _ = dispatcher_handle.await;
    tracing::info!(
        notifications_sent_total =
            notifications_sent_total.load(std::sync::atomic::Ordering::Relaxed),
        "dbwatch stopped"
    );
    Ok(())
}
