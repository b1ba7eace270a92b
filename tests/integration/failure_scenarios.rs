//! Failure tests for the monitoring pipeline
//!
//! These tests verify that collaborator failures degrade gracefully:
//! - Failing and hanging notification backends
//! - Liveness queries that error out
//! - Webhook endpoints returning errors
//! - Invalid configuration rejected at startup

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use service_monitor::{
    Config, ConfigError, Notifier, Notifiers,
    config::Webhook,
    notify::WebhookNotifier,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_one_failing_backend_does_not_block_the_others() {
    let first = Arc::new(RecordingNotifier::default());
    let failing = Arc::new(FailingNotifier::default());
    let third = Arc::new(RecordingNotifier::default());

    let dispatch = Notifiers::new(vec![
        first.clone() as Arc<dyn Notifier>,
        failing.clone() as Arc<dyn Notifier>,
        third.clone() as Arc<dyn Notifier>,
    ]);

    let report = dispatch.notify_all("disk full").await;

    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(first.messages(), ["disk full"]);
    assert_eq!(third.messages(), ["disk full"]);
    assert_eq!(failing.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_backend_is_cut_off_by_timeout() {
    let recording = Arc::new(RecordingNotifier::default());
    let dispatch = Notifiers::new(vec![
        Arc::new(HangingNotifier) as Arc<dyn Notifier>,
        recording.clone() as Arc<dyn Notifier>,
    ])
    .with_timeout(Duration::from_secs(5));

    let report = dispatch.notify_all("cpu hot").await;

    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(recording.messages(), ["cpu hot"]);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_backend_initialization_does_not_block_startup() {
    let manager = Arc::new(MockServiceManager::new());
    let recording = Arc::new(RecordingNotifier::default());

    let mut engine = tokio::time::timeout(
        Duration::from_secs(3600),
        start_engine(
            services_config(json!([{ "name": "web", "checkInterval": 5 }]), 30, 0),
            manager.clone(),
            notifiers(vec![
                Arc::new(HangingNotifier) as Arc<dyn Notifier>,
                recording.clone() as Arc<dyn Notifier>,
            ]),
        ),
    )
    .await
    .expect("engine should start despite a hanging backend");

    assert_eq!(recording.initialized(), 1);

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(engine.store().query("web").await.len(), 2);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_query_errors_count_as_down_and_monitoring_continues() {
    let manager = Arc::new(MockServiceManager::new());
    manager.fail_queries("ghost");

    let recording = Arc::new(RecordingNotifier::default());
    let mut engine = start_engine(
        services_config(
            json!([
                { "name": "ghost", "checkInterval": 5, "restartIfDown": true },
                { "name": "web", "checkInterval": 5 }
            ]),
            30,
            60,
        ),
        manager.clone(),
        notifiers(vec![recording.clone() as Arc<dyn Notifier>]),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(10_500)).await;

    let ghost = engine.store().query("ghost").await;
    assert_eq!(ghost.len(), 3);
    assert!(ghost.iter().all(|s| !s.running));
    assert_eq!(manager.restarts("ghost"), 3);

    let web = engine.store().query("web").await;
    assert_eq!(web.len(), 3);
    assert!(web.iter().all(|s| s.running));

    assert_eq!(recording.count_containing("ghost"), 1);
    assert_eq!(recording.count_containing("web"), 0);

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_notifier_does_not_stop_monitoring() {
    let manager = Arc::new(MockServiceManager::new());
    manager.set_running("web", false);

    let failing = Arc::new(FailingNotifier::default());
    let mut engine = start_engine(
        services_config(json!([{ "name": "web", "checkInterval": 1 }]), 30, 0),
        manager.clone(),
        notifiers(vec![failing.clone() as Arc<dyn Notifier>]),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(4_500)).await;

    assert_eq!(engine.store().query("web").await.len(), 5);
    assert!(failing.attempts() >= 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_webhook_error_status_is_reported_as_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let webhook = WebhookNotifier::new(
        reqwest::Client::new(),
        Webhook {
            url: format!("{}/hook", mock_server.uri()),
        },
    );
    let dispatch = Notifiers::new(vec![Arc::new(webhook) as Arc<dyn Notifier>]);

    let report = dispatch.notify_all("Service web is down").await;

    assert_eq!(report.delivered, 0);
    assert_eq!(report.failed, 1);
}

#[test]
fn test_invalid_configurations_are_rejected() {
    let cases = [
        (
            json!({ "services": [], "settings": { "monitor": { "checkInterval": 30 } } }),
            "no services",
        ),
        (
            json!({
                "services": [{ "name": "web" }],
                "settings": { "monitor": { "checkInterval": 0 } }
            }),
            "zero interval",
        ),
        (
            json!({
                "services": [{ "name": "web" }],
                "settings": { "monitor": { "checkInterval": 30, "exponentialBackoffSeconds": -1 } }
            }),
            "negative backoff",
        ),
        (
            json!({
                "services": [{ "name": "web", "specificPattern": "(unclosed" }],
                "settings": { "monitor": { "checkInterval": 30 } }
            }),
            "bad pattern",
        ),
        (
            json!({
                "services": [{ "name": "" }],
                "settings": { "monitor": { "checkInterval": 30 } }
            }),
            "missing name",
        ),
    ];

    for (json, case) in cases {
        assert!(
            Config::from_json(&json.to_string()).is_err(),
            "{case} should be rejected"
        );
    }
}

#[test]
fn test_missing_config_file_is_an_io_error() {
    let result = service_monitor::read_config_file("/nonexistent/monitor.json");

    assert!(matches!(result, Err(ConfigError::Io(_))));
}
