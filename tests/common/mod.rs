//! Shared utilities for integration tests: mock agent service, mock
//! registry and an in-process gateway, all on ephemeral ports.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_gateway::config::GatewayConfig;
use api_gateway::http::{AppState, HttpServer};
use api_gateway::lifecycle::Shutdown;
use api_gateway::registry::RegistryClient;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Programmable stand-in for the downstream agent service.
#[derive(Clone, Default)]
pub struct MockAgent {
    pub status: Arc<AtomicU16>,
    pub calls: Arc<AtomicU32>,
    pub last_body: Arc<Mutex<Option<Bytes>>>,
}

impl MockAgent {
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<Bytes> {
        self.last_body.lock().unwrap().clone()
    }
}

async fn recommendations(State(agent): State<MockAgent>, body: Bytes) -> Response {
    agent.calls.fetch_add(1, Ordering::SeqCst);
    *agent.last_body.lock().unwrap() = Some(body);
    let status = StatusCode::from_u16(agent.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK);
    (status, r#"{"recommendations":["index funds"],"source":"mock"}"#).into_response()
}

async fn recommendations_stream(State(agent): State<MockAgent>) -> Response {
    agent.calls.fetch_add(1, Ordering::SeqCst);
    let events = futures_util::stream::iter(0..3).then(|i| async move {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok::<_, Infallible>(format!("data: {{\"step\":{}}}\n\n", i))
    });
    ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(events)).into_response()
}

async fn agent_openapi() -> Json<Value> {
    Json(serde_json::json!({
        "openapi": "3.0.0",
        "info": { "title": "Agent Service", "version": "1.0.0" },
        "paths": {}
    }))
}

/// Start the mock agent; returns its base URL.
pub async fn start_mock_agent(agent: MockAgent) -> String {
    if agent.status.load(Ordering::SeqCst) == 0 {
        agent.set_status(200);
    }
    let app = Router::new()
        .route("/recommendations", post(recommendations))
        .route("/recommendations/stream", post(recommendations_stream))
        .route("/openapi.json", get(agent_openapi))
        .with_state(agent);
    format!("http://{}", serve(app).await)
}

/// Minimal registry: records registrations and heartbeats, serves a
/// configurable instance listing.
#[derive(Clone, Default)]
pub struct MockRegistry {
    pub registrations: Arc<Mutex<Vec<(String, String, String)>>>,
    pub heartbeats: Arc<Mutex<Vec<String>>>,
    pub listing: Arc<Mutex<Option<Value>>>,
    pub register_status: Arc<AtomicU16>,
    pub delay: Arc<Mutex<Option<Duration>>>,
}

impl MockRegistry {
    pub fn set_listing(&self, listing: Value) {
        *self.listing.lock().unwrap() = Some(listing);
    }
}

async fn register(
    State(reg): State<MockRegistry>,
    Path(app): Path<String>,
    headers: axum::http::HeaderMap,
    body: String,
) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    reg.registrations.lock().unwrap().push((app, content_type, body));
    StatusCode::from_u16(reg.register_status.load(Ordering::SeqCst)).unwrap_or(StatusCode::NO_CONTENT)
}

async fn heartbeat(State(reg): State<MockRegistry>, Path((app, id)): Path<(String, String)>) -> StatusCode {
    reg.heartbeats.lock().unwrap().push(format!("{}/{}", app, id));
    StatusCode::OK
}

async fn listing(State(reg): State<MockRegistry>, Path(_app): Path<String>) -> Response {
    let delay = *reg.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let listing = reg.listing.lock().unwrap().clone();
    match listing {
        Some(value) => Json(value).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the mock registry; returns its base URL (ending in `/eureka`).
pub async fn start_mock_registry(registry: MockRegistry) -> String {
    if registry.register_status.load(Ordering::SeqCst) == 0 {
        registry.register_status.store(204, Ordering::SeqCst);
    }
    let app = Router::new()
        .route("/eureka/apps/{app}", post(register).get(listing))
        .route("/eureka/apps/{app}/{id}", put(heartbeat))
        .with_state(registry);
    format!("http://{}/eureka", serve(app).await)
}

/// Config pointing at a static downstream with the registry switched off.
pub fn static_config(agent_base: Option<String>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.registry.enabled = false;
    config.downstream.base_url = agent_base;
    config.timeouts.request_ms = 5_000;
    config
}

/// Run a gateway in-process; returns its address and the shutdown handle.
pub async fn start_gateway(config: GatewayConfig, registry: Option<RegistryClient>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(AppState::new(config, registry, None));
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
