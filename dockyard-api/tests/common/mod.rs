//! Shared helpers for dockyard-api integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use dockyard_api::{create_app, AccessGate, AppState};
use dockyard_store::{test_utils, BlobStore, ConsoleStore, MemoryBlobStore};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

pub use test_utils::create_test_db;

/// Helper to extract JSON body from axum response
pub async fn extract_json_body<T>(response: Response<Body>) -> T
where
    T: serde::de::DeserializeOwned,
{
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}

pub async fn extract_text_body(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    String::from_utf8(body.to_vec()).expect("Body is not UTF-8")
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("Failed to count rows");
    count
}

/// Drives the full router (gate, dispatcher, layers) in process.
pub struct TestClient {
    pub app: Router,
    pub pool: SqlitePool,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestClient {
    /// Dev-mode gate, in-memory database and blob store
    pub async fn new() -> Self {
        Self::with_gate(AccessGate::dev()).await
    }

    pub async fn with_gate(gate: AccessGate) -> Self {
        let pool = create_test_db().await;
        let blobs = Arc::new(MemoryBlobStore::new());
        let state = AppState::new(
            ConsoleStore::new(pool.clone()),
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
            gate,
        );

        Self {
            app: create_app(state),
            pool,
            blobs,
        }
    }

    pub fn store(&self) -> ConsoleStore {
        ConsoleStore::new(self.pool.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn send_json(&self, method: &str, uri: &str, body: Option<&Value>) -> Response<Body> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send_json("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> Response<Body> {
        self.send_json("POST", uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: &Value) -> Response<Body> {
        self.send_json("PUT", uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send_json("DELETE", uri, None).await
    }

    /// Status plus parsed JSON body
    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.get(uri).await;
        (response.status(), extract_json_body(response).await)
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let response = self.post(uri, body).await;
        (response.status(), extract_json_body(response).await)
    }

    pub async fn put_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let response = self.put(uri, body).await;
        (response.status(), extract_json_body(response).await)
    }

    pub async fn delete_json(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.delete(uri).await;
        (response.status(), extract_json_body(response).await)
    }

    /// Fixture: register a container with defaults
    pub async fn register(&self, name: &str) -> Value {
        let (status, body) = self
            .post_json(
                "/api/containers/register",
                &serde_json::json!({ "name": name, "className": "ApiContainer" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["container"].clone()
    }
}
