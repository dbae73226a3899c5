//! Shared fixtures for client integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tachyon_client::{ApiClient, ClientConfig};
use wiremock::MockServer;

pub const USECASE: &str = "usecase_001";

/// Config pointed at the mock server with fast retries.
pub fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(server.uri())
        .with_usecase(USECASE)
        .with_max_retries(3)
        .with_retry_delay(Duration::from_millis(20))
        .with_cache_ttl(Duration::from_secs(60))
        .with_timeout(Duration::from_secs(5))
}

pub fn client(server: &MockServer) -> Arc<ApiClient> {
    Arc::new(ApiClient::with_config(config(server)).expect("client"))
}

/// Path of a tenant-scoped endpoint under the default usecase.
pub fn scoped(rest: &str) -> String {
    format!("/api/v1/usecases/{}/{}", USECASE, rest)
}

pub fn dataset_json(id: &str, alias: &str) -> Value {
    json!({
        "id": id,
        "alias": alias,
        "numGoldens": 0,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "user": "tester"
    })
}

pub fn golden_json(id: &str, input: &str, expected: &str) -> Value {
    json!({
        "id": id,
        "input": input,
        "expectedOutput": expected,
        "context": "",
        "retrievalContext": "",
        "count": 0,
        "tags": []
    })
}

pub fn history_json(id: &str, dataset_id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "evaluation_name": format!("run {}", id),
        "dataset_id": dataset_id,
        "model_id": "gemini_pro_2_0",
        "temperature": "0.7",
        "parameters": [],
        "usecase_id": USECASE,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "status": status,
        "result": {}
    })
}

/// Number of requests the server saw for `method` + `path`.
pub async fn hits(server: &MockServer, method: &str, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == method && r.url.path() == path)
        .count()
}
