//! Concurrency tests
//!
//! These tests verify that:
//! - A hung check for one service never delays another service
//! - A hung service manager call times out and monitoring of that service goes on
//! - Overlapping checks of the same service wait for the running one
//! - The status store and the backoff gate stay consistent under contention

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde_json::json;
use service_monitor::{BackoffGate, Notifier, StatusStore};

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn test_hung_service_does_not_delay_others() {
    let manager = Arc::new(MockServiceManager::new());
    manager.set_delay("slow", Duration::from_secs(3600));

    let mut engine = start_engine(
        services_config(
            json!([
                { "name": "slow", "checkInterval": 5 },
                { "name": "fast", "checkInterval": 5 }
            ]),
            30,
            0,
        ),
        manager.clone(),
        notifiers(vec![]),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(20_500)).await;

    assert_eq!(engine.store().query("fast").await.len(), 5);

    // every slow query times out after one interval and is recorded as down
    let slow = engine.store().query("slow").await;
    assert!(slow.len() >= 3, "only {} samples", slow.len());
    assert!(slow.iter().all(|s| !s.running));
    assert!(manager.queries("slow") > slow.len());

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_monitoring_resumes_after_hung_query() {
    let manager = Arc::new(MockServiceManager::new());
    manager.set_running("web", false);
    manager.hang_next_query("web");
    let recorder = Arc::new(RecordingNotifier::default());

    let mut engine = start_engine(
        services_config(json!([{ "name": "web", "checkInterval": 5 }]), 30, 0),
        manager.clone(),
        notifiers(vec![recorder.clone() as Arc<dyn Notifier>]),
    )
    .await;

    tokio::time::sleep(Duration::from_secs(60)).await;

    let samples = engine.store().query("web").await;
    assert!(samples.len() >= 10, "only {} samples", samples.len());
    assert!(samples.iter().all(|s| !s.running));
    assert!(manager.queries("web") >= 10);
    assert!(recorder.count_containing("is down") >= 1);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_check_delays_next_check_of_same_service() {
    let manager = Arc::new(MockServiceManager::new());
    manager.set_delay("db", Duration::from_secs(7));

    let mut engine = start_engine(
        config(json!({
            "services": [{ "name": "db", "checkInterval": 5 }],
            "settings": {
                "monitor": { "checkInterval": 30, "checkTimeoutSeconds": 30 }
            }
        })),
        manager.clone(),
        notifiers(vec![]),
    )
    .await;

    // checks run 0-7s and 7-14s, the request due at 10s starts at 14s
    tokio::time::sleep(Duration::from_millis(17_500)).await;

    let samples = engine.store().query("db").await;
    assert_eq!(samples.len(), 2);
    assert!(samples.windows(2).all(|w| w[0].time <= w[1].time));
    assert_eq!(manager.queries("db"), 3);
    assert_eq!(engine.checker().unwrap().in_flight().await, Some(1));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_writers_never_lose_samples() {
    let store = StatusStore::with_services(["a", "b"]);
    let start = Utc::now();

    let mut tasks = Vec::new();
    for writer in 0..50i64 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..20i64 {
                let service = if i % 2 == 0 { "a" } else { "b" };
                let time = start + TimeDelta::milliseconds(writer * 1000 + i);
                store.record(service, time, writer % 3 != 0).await;
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let a = store.query("a").await;
    let b = store.query("b").await;
    assert_eq!(a.len(), 500);
    assert_eq!(b.len(), 500);
    assert!(a.windows(2).all(|w| w[0].time <= w[1].time));
    assert!(b.windows(2).all(|w| w[0].time <= w[1].time));
}

#[tokio::test]
async fn test_simultaneous_down_events_pass_the_gate_once() {
    let gate = BackoffGate::new(30, ["web"]);
    let now = Utc::now();

    let mut tasks = Vec::new();
    for _ in 0..64 {
        let gate = gate.clone();
        tasks.push(tokio::spawn(async move { gate.try_fire("web", now).await }));
    }

    let mut fired = 0;
    for task in tasks {
        if task.await.unwrap().fired() {
            fired += 1;
        }
    }

    assert_eq!(fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_many_services_run_independently() {
    let manager = Arc::new(MockServiceManager::new());
    let services: Vec<_> = (0..25)
        .map(|i| json!({ "name": format!("svc-{i}"), "checkInterval": 1 + i % 3 }))
        .collect();

    let mut engine = start_engine(
        services_config(json!(services), 30, 0),
        manager.clone(),
        notifiers(vec![]),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(6_500)).await;

    for i in 0..25 {
        let name = format!("svc-{i}");
        let interval = 1 + i % 3;
        let expected = (6 / interval + 1) as usize;
        assert_eq!(
            engine.store().query(&name).await.len(),
            expected,
            "{name} with interval {interval}"
        );
    }

    engine.shutdown().await;
}
