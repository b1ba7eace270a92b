//! Integration tests for the dashboard and JSON endpoints

use std::net::SocketAddr;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::Value;
use service_monitor::{
    StatusStore,
    api::{ApiConfig, ApiState, spawn_api_server},
};

async fn spawn_test_api(store: StatusStore, services: &[&str]) -> SocketAddr {
    let state = ApiState::new(store, services.iter().map(|s| s.to_string()));

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    spawn_api_server(config, state).await.unwrap()
}

async fn seeded_store() -> StatusStore {
    let store = StatusStore::with_services(["nginx", "postgres"]);
    let now = Utc::now();

    store.record("nginx", now - Duration::seconds(20), true).await;
    store.record("nginx", now - Duration::seconds(10), false).await;
    store.record("nginx", now - Duration::seconds(15), true).await;

    store
}

#[tokio::test]
async fn test_dashboard_lists_every_service() {
    let addr = spawn_test_api(seeded_store().await, &["nginx", "postgres"]).await;

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains("nginx"));
    assert!(body.contains("tested 3 times"));
    assert!(body.contains("ERR, "));
    assert!(body.contains("66.67%"));

    assert!(body.contains("postgres"));
    assert!(body.contains("tested 0 times"));
    assert!(body.contains("Not yet checked"));
}

#[tokio::test]
async fn test_history_endpoint_returns_ordered_samples() {
    let addr = spawn_test_api(seeded_store().await, &["nginx", "postgres"]).await;

    let body: Value = reqwest::get(format!("http://{addr}/api"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let nginx = body["nginx"].as_array().unwrap();
    let running: Vec<bool> = nginx
        .iter()
        .map(|s| s["running"].as_bool().unwrap())
        .collect();
    assert_eq!(running, [true, true, false]);
    assert!(nginx[0]["time"].is_string());

    assert_eq!(body["postgres"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_services_summary() {
    let addr = spawn_test_api(seeded_store().await, &["nginx", "postgres"]).await;

    let body: Value = reqwest::get(format!("http://{addr}/api/services"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["count"], 2);

    let nginx = &body["services"][0];
    assert_eq!(nginx["name"], "nginx");
    assert_eq!(nginx["checks"], 3);
    assert_eq!(nginx["lastStatus"], "down");
    assert!(nginx["secondsSinceLastCheck"].as_i64().unwrap() >= 10);

    let postgres = &body["services"][1];
    assert_eq!(postgres["lastStatus"], "unknown");
    assert!(postgres["uptime"].is_null());
    assert!(postgres["lastCheck"].is_null());
}

#[tokio::test]
async fn test_single_service_and_unknown_service() {
    let addr = spawn_test_api(seeded_store().await, &["nginx", "postgres"]).await;

    let response = reqwest::get(format!("http://{addr}/api/services/nginx"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "nginx");
    assert_eq!(body["samples"].as_array().unwrap().len(), 3);

    let response = reqwest::get(format!("http://{addr}/api/services/redis"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("redis"));
}
