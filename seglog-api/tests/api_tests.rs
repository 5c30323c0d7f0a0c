//! # API Tests
//!
//! End-to-end flows over a real listener: server, remote client, and the
//! HTTP status contract.

use std::sync::Arc;

use tempfile::TempDir;

use seglog_api::{create_router, AppState, RemoteClient};
use seglog_core::config::{ApiConfig, StoreConfig};
use seglog_core::Error;

async fn spawn_server(dir: &TempDir) -> String {
    let config = ApiConfig {
        port: 0,
        store: StoreConfig::new(dir.path(), 1024),
    };
    let state = Arc::new(AppState::new(config).await.unwrap());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn put_get_delete_round_trip() {
    let dir = TempDir::new().unwrap();
    let endpoint = spawn_server(&dir).await;
    let client = RemoteClient::connect(&endpoint).await.unwrap();

    client.put("greeting", "hello").await.unwrap();
    assert_eq!(client.get("greeting").await.unwrap(), "hello");

    client.put("greeting", "hello again").await.unwrap();
    assert_eq!(client.get("greeting").await.unwrap(), "hello again");

    client.delete("greeting").await.unwrap();
    assert!(matches!(
        client.get("greeting").await,
        Err(Error::NotFound)
    ));
}

#[tokio::test]
async fn status_codes_follow_the_contract() {
    let dir = TempDir::new().unwrap();
    let endpoint = spawn_server(&dir).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{endpoint}/db/k"))
        .json(&serde_json::json!({ "value": "v" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    let resp = http.get(format!("{endpoint}/db/k")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["key"], "k");
    assert_eq!(body["value"], "v");

    let resp = http
        .get(format!("{endpoint}/db/absent"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let resp = http
        .delete(format!("{endpoint}/db/k"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

    let resp = http.get(format!("{endpoint}/db/k")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reserved_value_is_a_bad_request() {
    let dir = TempDir::new().unwrap();
    let endpoint = spawn_server(&dir).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{endpoint}/db/k"))
        .json(&serde_json::json!({ "value": "DELETE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let dir = TempDir::new().unwrap();
    let endpoint = spawn_server(&dir).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{endpoint}/db/k"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn stats_reports_store_shape() {
    let dir = TempDir::new().unwrap();
    let endpoint = spawn_server(&dir).await;
    let client = RemoteClient::connect(&endpoint).await.unwrap();

    client.put("a", "1").await.unwrap();
    client.put("b", "2").await.unwrap();
    let _ = client.get("a").await.unwrap();

    let stats = client.stats().await.unwrap();
    assert_eq!(stats["segments"], 1);
    assert_eq!(stats["metrics"]["puts"], 2);
    assert_eq!(stats["metrics"]["gets"], 1);
}
