//! Gateway endpoints: descriptor, liveness and the proxied agent routes.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
    response::Response,
    routing::{post, MethodRouter},
    Json,
};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::http::request::X_REQUEST_ID;
use crate::http::response::GatewayError;
use crate::http::server::AppState;
use crate::proxy::UpstreamCall;
use crate::routing::ProxyRoute;

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "API Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "openapi": "/openapi.json",
            "aggregate": "/api-docs/aggregate",
            "agent": "/agent",
            "agent-stream": "/agent/stream",
            "circuit-breaker": "/admin/circuit-breaker",
            "circuit-breakers": "/admin/circuit-breakers",
            "registry": "/admin/registry",
        },
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST handler for a proxied route; other methods get a JSON 405.
pub fn proxy_route(route: ProxyRoute) -> MethodRouter<AppState> {
    post(move |State(state): State<AppState>, headers: HeaderMap, body: Bytes| {
        forward(route, state, headers, body)
    })
    .fallback(|| async { GatewayError::MethodNotAllowed })
}

async fn forward(
    route: ProxyRoute,
    state: AppState,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let deadline = Instant::now() + state.config.timeouts.request();

    let target = state
        .resolver
        .resolve(deadline)
        .await
        .ok_or_else(|| GatewayError::NoTarget {
            app: state.resolver.app_name().to_string(),
        })?;

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        Bytes::from_static(b"{}")
    } else {
        body
    };

    let call = UpstreamCall {
        method: Method::POST,
        url: target.url_for(route.upstream_path),
        body: Some(body),
        deadline,
        request_id: headers.get(X_REQUEST_ID).cloned(),
    };
    tracing::debug!(
        route = route.path,
        url = %call.url,
        source = ?target.source,
        mode = ?route.mode,
        "Forwarding request"
    );

    let breaker = state.breakers.get_or_create(&target.app_name);
    Ok(route.mode.forward(&state.upstream, &breaker, call).await?)
}
