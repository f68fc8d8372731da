#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use slotlock_api::config::{LockBackend, ServerConfig};
use slotlock_api::middleware::holder::HOLDER_HEADER;
use slotlock_api::router::build_app_router;
use slotlock_api::state::AppState;
use slotlock_core::clock::ManualClock;
use slotlock_core::memory_store::MemoryLockStore;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout, and a 60-second lock TTL.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        lock_ttl_secs: 60,
        sweep_interval_secs: 60,
        lock_backend: LockBackend::Memory,
    }
}

/// A router over an in-memory store whose clock the test controls.
pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
}

/// Build the full application router with all middleware layers, backed by
/// an in-memory store on a manual clock.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(MemoryLockStore::with_clock(config.lock_ttl_secs, clock.clone()));

    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        clock,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

fn request(method: Method, uri: &str, holder: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(holder) = holder {
        builder = builder.header(HOLDER_HEADER, holder);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn get(app: &Router, uri: &str, holder: Option<&str>) -> Response<Body> {
    send(app, request(Method::GET, uri, holder)).await
}

pub async fn post(app: &Router, uri: &str, holder: Option<&str>) -> Response<Body> {
    send(app, request(Method::POST, uri, holder)).await
}

pub async fn delete(app: &Router, uri: &str, holder: Option<&str>) -> Response<Body> {
    send(app, request(Method::DELETE, uri, holder)).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
