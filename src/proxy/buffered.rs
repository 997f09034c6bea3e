//! Buffered JSON passthrough.
//!
//! The breaker outcome is decided by the upstream status: transport failure,
//! deadline or 5xx count as failures, everything else as success. The body is
//! forwarded byte for byte with `Content-Type: application/json`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::header,
    response::Response,
};

use super::{body_with_deadline, ProxyError, UpstreamCall, UpstreamClient};
use crate::resilience::CircuitBreaker;

pub async fn forward(
    client: &UpstreamClient,
    breaker: &Arc<CircuitBreaker>,
    call: UpstreamCall,
) -> Result<Response, ProxyError> {
    let permit = breaker.try_acquire()?;

    let upstream = match client.send(&call, "application/json").await {
        Ok(upstream) => upstream,
        Err(e) => {
            permit.failure();
            tracing::warn!(url = %call.url, error = %e, "Upstream request failed");
            return Err(e);
        }
    };

    let status = upstream.status();
    permit.record_status(status.as_u16());
    if status.is_server_error() {
        tracing::warn!(url = %call.url, status = status.as_u16(), "Upstream returned server error");
    }

    let body = body_with_deadline(upstream.into_body(), call.deadline);
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(body))
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::resilience::Phase;
    use axum::{http::{Method, StatusCode}, routing::post, Router};
    use std::time::Duration;
    use tokio::time::Instant;

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn call(url: String, body: &'static str) -> UpstreamCall {
        UpstreamCall {
            method: Method::POST,
            url,
            body: Some(body.into()),
            deadline: Instant::now() + Duration::from_secs(5),
            request_id: None,
        }
    }

    fn breaker() -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new("AGENT-SERVICE", CircuitBreakerConfig::default()))
    }

    #[tokio::test]
    async fn test_forwards_status_and_body() {
        let app = Router::new().route(
            "/recommendations",
            post(|body: String| async move { (StatusCode::CREATED, format!("{{\"echo\":{}}}", body)) }),
        );
        let base = spawn_upstream(app).await;
        let cb = breaker();

        let response = forward(&UpstreamClient::new(), &cb, call(format!("{}/recommendations", base), r#"{"q":1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], br#"{"echo":{"q":1}}"#);
        assert_eq!(cb.snapshot().counts.total_successes, 1);
    }

    #[tokio::test]
    async fn test_server_errors_trip_breaker() {
        let app = Router::new().route("/fail", post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "{}") }));
        let base = spawn_upstream(app).await;
        let cb = breaker();
        let client = UpstreamClient::new();

        for _ in 0..3 {
            let response = forward(&client, &cb, call(format!("{}/fail", base), "{}")).await.unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
        assert_eq!(cb.phase(), Phase::Open);
        let err = forward(&client, &cb, call(format!("{}/fail", base), "{}")).await.unwrap_err();
        assert!(matches!(err, ProxyError::Breaker(_)));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let cb = breaker();

        let err = forward(&UpstreamClient::new(), &cb, call(format!("http://{}/x", addr), "{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Transport(_)));
        assert_eq!(cb.snapshot().counts.total_failures, 1);
    }
}
