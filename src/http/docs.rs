//! OpenAPI documents: the gateway's own, an aggregate, and a same-origin
//! passthrough of the downstream service's document.
//!
//! Aggregation is best-effort: any failure to resolve or fetch the downstream
//! document leaves it out without failing the request.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue},
    response::Response,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::http::response::GatewayError;
use crate::http::server::AppState;
use crate::registry::ServiceInstance;

pub const AGENT_DOCS_PATH: &str = "/api-docs/agent/openapi.json";

pub async fn openapi() -> Json<Value> {
    Json(json!({
        "openapi": "3.0.0",
        "info": {
            "title": "API Gateway",
            "description": "API Gateway with service discovery, circuit breaking and rate limiting",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/health": {
                "get": {
                    "summary": "Health check",
                    "responses": { "200": { "description": "OK" } }
                }
            },
            "/agent": {
                "post": {
                    "summary": "Get agent recommendations",
                    "responses": {
                        "200": { "description": "OK" },
                        "429": { "description": "Rate limit exceeded" },
                        "502": { "description": "Upstream unreachable" },
                        "503": { "description": "Circuit breaker open" }
                    }
                }
            },
            "/agent/stream": {
                "post": {
                    "summary": "Stream agent recommendations",
                    "responses": { "200": { "description": "Event stream" } }
                }
            },
            "/admin/circuit-breaker": {
                "get": {
                    "summary": "Circuit breaker state and counters",
                    "responses": { "200": { "description": "OK" } }
                }
            }
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct ServiceSpec {
    pub name: &'static str,
    pub spec: Option<Value>,
    pub url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Aggregate {
    pub services: Vec<ServiceSpec>,
    pub count: usize,
}

pub async fn aggregate(State(state): State<AppState>) -> Json<Aggregate> {
    let mut services = vec![ServiceSpec {
        name: "api-gateway",
        spec: None,
        url: "/openapi.json",
    }];

    let deadline = Instant::now() + state.config.timeouts.docs();
    if let Some(spec) = fetch_downstream_spec(&state, deadline).await {
        services.push(ServiceSpec {
            name: "agent-service",
            spec: Some(spec),
            url: AGENT_DOCS_PATH,
        });
    }

    let count = services.len();
    Json(Aggregate { services, count })
}

async fn fetch_downstream_spec(state: &AppState, deadline: Instant) -> Option<Value> {
    let target = state.resolver.resolve(deadline).await?;
    let remaining = deadline.saturating_duration_since(Instant::now());

    let response = state
        .docs_client
        .get(spec_url(&target))
        .header(header::ACCEPT, "application/json")
        .timeout(remaining)
        .send()
        .await;

    match response {
        Ok(r) if r.status() == reqwest::StatusCode::OK => match r.json::<Value>().await {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::debug!(error = %e, "Downstream OpenAPI document is not JSON");
                None
            }
        },
        Ok(r) => {
            tracing::debug!(status = r.status().as_u16(), "Downstream OpenAPI document unavailable");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "Downstream OpenAPI fetch failed");
            None
        }
    }
}

/// Same-origin copy of the downstream document.
pub async fn agent_openapi(State(state): State<AppState>) -> Result<Response, GatewayError> {
    let deadline = Instant::now() + state.config.timeouts.request();
    let target = state
        .resolver
        .resolve(deadline)
        .await
        .ok_or_else(|| GatewayError::Unavailable("agent".to_string()))?;
    let remaining = deadline.saturating_duration_since(Instant::now());

    let upstream = state
        .docs_client
        .get(spec_url(&target))
        .header(header::ACCEPT, "application/json")
        .timeout(remaining)
        .send()
        .await
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;

    let status = upstream.status();
    let headers = upstream.headers().clone();
    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    for (name, value) in &headers {
        if *name != header::CONTENT_LENGTH && *name != header::TRANSFER_ENCODING && *name != header::CONNECTION {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    Ok(response)
}

fn spec_url(target: &ServiceInstance) -> String {
    target.url_for("/openapi.json")
}
