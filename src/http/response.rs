//! Error responses.
//!
//! Every failure the gateway produces itself is a [`GatewayError`] rendered as
//! `{"error": <status reason>, "message": <detail>}` with the matching status.
//! Upstream responses, including upstream errors, are forwarded as-is and
//! never pass through here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::proxy::ProxyError;
use crate::resilience::BreakerError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Too Many Requests")]
    RateLimited,

    #[error("Service Unavailable (Circuit Breaker Open)")]
    BreakerOpen,

    #[error("Service Unavailable (Circuit Breaker Half-Open Limit)")]
    BreakerHalfOpenLimit,

    #[error("Upstream failed: {0}")]
    Upstream(String),

    /// Neither the registry nor the static fallback produced a target.
    #[error("no base url for {app}: register it or set AGENT_BASE_URL")]
    NoTarget { app: String },

    #[error("{0} service not available")]
    Unavailable(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BreakerOpen
            | GatewayError::BreakerHalfOpenLimit
            | GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NoTarget { .. } | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<BreakerError> for GatewayError {
    fn from(e: BreakerError) -> Self {
        match e {
            BreakerError::Open(_) => GatewayError::BreakerOpen,
            BreakerError::TooManyRequests(_) => GatewayError::BreakerHalfOpenLimit,
        }
    }
}

impl From<ProxyError> for GatewayError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::Breaker(b) => b.into(),
            ProxyError::InvalidRequest(msg) => GatewayError::Internal(msg),
            other => GatewayError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("Error"),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// JSON 404 for unmatched paths.
pub async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limited_body() {
        let response = GatewayError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers()["content-type"],
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(json["error"], "Too Many Requests");
    }

    #[tokio::test]
    async fn test_breaker_errors_are_distinguished() {
        let open: GatewayError = BreakerError::Open("A".into()).into();
        let limit: GatewayError = BreakerError::TooManyRequests("A".into()).into();
        assert_eq!(open.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(limit.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_ne!(open.to_string(), limit.to_string());
        assert!(body_json(open.into_response()).await["message"]
            .as_str()
            .unwrap()
            .contains("Open"));
    }

    #[test]
    fn test_proxy_errors_map_to_bad_gateway() {
        let err: GatewayError = ProxyError::Timeout.into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let err: GatewayError = GatewayError::NoTarget { app: "AGENT-SERVICE".into() };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("AGENT-SERVICE"));
    }
}
