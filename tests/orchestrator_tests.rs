// Refresh cycle end-to-end against stub collaborators

mod common;

use common::*;
use dbwatch::alert_engine::AlertDecision;
use dbwatch::classify::INVALID_CREDENTIALS_MESSAGE;
use dbwatch::models::MonitoringState;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_missing_credentials_stops_before_listing() {
    let h = harness(
        StubCredentials {
            exists: false,
            resolve_error: None,
        },
        StubLister::returning(vec![instance("db-1")]),
    );
    assert_eq!(h.monitor.refresh().await, MonitoringState::NoCredentials);
    assert_eq!(h.monitor.state(), MonitoringState::NoCredentials);
    assert_eq!(h.lister.calls(), 0);
    assert!(h.monitor.last_update_time().is_none());
}

#[tokio::test]
async fn test_profile_lookup_failure_is_invalid_credentials() {
    let h = harness(
        StubCredentials {
            exists: true,
            resolve_error: Some("profile section is malformed".into()),
        },
        StubLister::returning(vec![instance("db-1")]),
    );
    match h.monitor.refresh().await {
        MonitoringState::InvalidCredentials(reason) => {
            assert!(reason.contains("default"));
            assert!(reason.contains("malformed"));
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(h.lister.calls(), 0);
}

#[tokio::test]
async fn test_empty_fleet_is_no_databases_and_updates_timestamp() {
    let h = harness(StubCredentials::valid(), StubLister::returning(vec![]));
    assert_eq!(h.monitor.refresh().await, MonitoringState::NoDatabases);
    assert!(h.monitor.last_update_time().is_some());
    assert!(h.monitor.snapshot().instances.is_empty());
}

#[tokio::test]
async fn test_access_denied_listing_is_invalid_credentials() {
    let h = harness(
        StubCredentials::valid(),
        StubLister::failing("AccessDenied: User is not permitted to perform rds:DescribeDBInstances"),
    );
    assert_eq!(
        h.monitor.refresh().await,
        MonitoringState::InvalidCredentials(INVALID_CREDENTIALS_MESSAGE.to_string())
    );
}

#[tokio::test]
async fn test_other_listing_failure_is_error() {
    let h = harness(
        StubCredentials::valid(),
        StubLister::failing("Throttling: Rate exceeded"),
    );
    match h.monitor.refresh().await {
        MonitoringState::Error(message) => assert!(message.contains("Rate exceeded")),
        other => panic!("unexpected state {:?}", other),
    }
    assert!(h.monitor.last_update_time().is_none());
}

#[tokio::test]
async fn test_failed_fetch_is_omitted_from_metrics_and_alerts() {
    let mut h = harness(
        StubCredentials::valid(),
        StubLister::returning(vec![instance("db-1"), instance("db-2"), instance("db-3")]),
    );
    for id in ["db-1", "db-2", "db-3"] {
        h.fetcher.set_sample(id, busy_sample());
    }
    h.fetcher.fail("db-2");

    assert_eq!(h.monitor.refresh().await, MonitoringState::Loaded);
    assert!(h.monitor.metrics_for("db-1").is_some());
    assert!(h.monitor.metrics_for("db-2").is_none());
    assert!(h.monitor.metrics_for("db-3").is_some());
    assert_eq!(h.monitor.snapshot().instances.len(), 3);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 3);

    let mut alerted: Vec<String> = drain(&mut h.alerts_rx)
        .into_iter()
        .map(|e| {
            assert!(matches!(e.decision, AlertDecision::Notify(_)));
            e.instance_id
        })
        .collect();
    alerted.sort();
    assert_eq!(alerted, vec!["db-1".to_string(), "db-3".to_string()]);
}

#[tokio::test]
async fn test_repeated_breach_notifies_once_then_clears() {
    let mut h = harness(
        StubCredentials::valid(),
        StubLister::returning(vec![instance("db-1")]),
    );
    h.fetcher.set_sample("db-1", busy_sample());

    h.monitor.refresh().await;
    h.monitor.refresh().await;
    let events = drain(&mut h.alerts_rx);
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].decision,
        AlertDecision::Notify("Database alert: db-1\nCPU: 90%".into())
    );

    h.fetcher.set_sample("db-1", idle_sample());
    h.monitor.refresh().await;
    let events = drain(&mut h.alerts_rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].decision, AlertDecision::Clear);
    assert_eq!(h.monitor.active_alerts().await, 0);
}

#[tokio::test]
async fn test_fetch_failure_keeps_existing_alert() {
    let mut h = harness(
        StubCredentials::valid(),
        StubLister::returning(vec![instance("db-1")]),
    );
    h.fetcher.set_sample("db-1", busy_sample());
    h.monitor.refresh().await;
    assert_eq!(drain(&mut h.alerts_rx).len(), 1);

    // Skipped, not evaluated as all-unavailable: no Clear.
    h.fetcher.fail("db-1");
    assert_eq!(h.monitor.refresh().await, MonitoringState::Loaded);
    assert!(drain(&mut h.alerts_rx).is_empty());
    assert_eq!(h.monitor.active_alerts().await, 1);

    // Same breach inside the dedup window stays quiet.
    h.fetcher.recover("db-1");
    h.monitor.refresh().await;
    assert!(drain(&mut h.alerts_rx).is_empty());
}

#[tokio::test]
async fn test_delisted_instance_alert_is_dropped() {
    let mut h = harness(
        StubCredentials::valid(),
        StubLister::returning(vec![instance("db-1"), instance("db-2")]),
    );
    h.fetcher.set_sample("db-1", busy_sample());
    h.fetcher.set_sample("db-2", busy_sample());
    h.monitor.refresh().await;
    assert_eq!(h.monitor.active_alerts().await, 2);

    h.lister.set_instances(vec![instance("db-2")]);
    h.monitor.refresh().await;
    assert_eq!(h.monitor.active_alerts().await, 1);
    drain(&mut h.alerts_rx);

    h.lister.set_instances(vec![]);
    assert_eq!(h.monitor.refresh().await, MonitoringState::NoDatabases);
    assert_eq!(h.monitor.active_alerts().await, 0);
}

#[tokio::test]
async fn test_failure_clears_fleet_but_keeps_last_update() {
    let h = harness(
        StubCredentials::valid(),
        StubLister::returning(vec![instance("db-1")]),
    );
    h.fetcher.set_sample("db-1", idle_sample());
    assert_eq!(h.monitor.refresh().await, MonitoringState::Loaded);
    let loaded_at = h.monitor.last_update_time().expect("timestamp");

    h.lister.set_error("connection reset by peer");
    assert!(h.monitor.refresh().await.is_failure());
    let snapshot = h.monitor.snapshot();
    assert!(snapshot.instances.is_empty());
    assert!(snapshot.metrics.is_empty());
    assert_eq!(snapshot.last_update_time, Some(loaded_at));
}

#[tokio::test]
async fn test_subscribers_see_loaded_snapshot() {
    let h = harness(
        StubCredentials::valid(),
        StubLister::returning(vec![instance("db-1")]),
    );
    h.fetcher.set_sample("db-1", idle_sample());
    let mut rx = h.monitor.subscribe();
    h.monitor.refresh().await;
    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.state, MonitoringState::Loaded);
    assert_eq!(snapshot.metrics_for("db-1").unwrap().cpu_utilization, 5.0);
}

#[tokio::test]
async fn test_concurrent_refreshes_are_serialized() {
    let h = harness(
        StubCredentials::valid(),
        StubLister::returning(vec![instance("db-1")]).with_delay_ms(30),
    );
    let monitor = Arc::new(h.monitor);
    let a = {
        let m = monitor.clone();
        tokio::spawn(async move { m.refresh().await })
    };
    let b = {
        let m = monitor.clone();
        tokio::spawn(async move { m.refresh().await })
    };
    assert_eq!(a.await.unwrap(), MonitoringState::Loaded);
    assert_eq!(b.await.unwrap(), MonitoringState::Loaded);
    assert_eq!(h.lister.calls(), 2);
    assert_eq!(h.lister.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_full_alert_queue_does_not_stall_refresh() {
    let mut h = harness_with_capacity(
        StubCredentials::valid(),
        StubLister::returning(vec![instance("db-1"), instance("db-2")]),
        1,
    );
    h.fetcher.set_sample("db-1", busy_sample());
    h.fetcher.set_sample("db-2", busy_sample());

    // Nobody drains the queue: the second Notify has nowhere to go.
    let state = tokio::time::timeout(Duration::from_secs(2), h.monitor.refresh())
        .await
        .expect("refresh must not wait on the notifier");
    assert_eq!(state, MonitoringState::Loaded);
    assert_eq!(h.monitor.state(), MonitoringState::Loaded);
    assert_eq!(h.monitor.active_alerts().await, 2);

    let state = tokio::time::timeout(Duration::from_secs(2), h.monitor.refresh())
        .await
        .expect("later refreshes are not blocked either");
    assert_eq!(state, MonitoringState::Loaded);
    assert_eq!(drain(&mut h.alerts_rx).len(), 1);
}

#[tokio::test]
async fn test_custom_auth_matcher_overrides_keywords() {
    fn throttling_is_auth(text: &str) -> bool {
        text.contains("Throttling")
    }
    let h = harness(
        StubCredentials::valid(),
        StubLister::failing("Throttling: Rate exceeded"),
    );
    let monitor = h.monitor.with_auth_matcher(throttling_is_auth);
    assert_eq!(
        monitor.refresh().await,
        MonitoringState::InvalidCredentials(INVALID_CREDENTIALS_MESSAGE.to_string())
    );

    h.lister.set_error("AccessDenied: not allowed");
    assert_eq!(
        monitor.refresh().await,
        MonitoringState::Error("AccessDenied: not allowed".into())
    );
}
