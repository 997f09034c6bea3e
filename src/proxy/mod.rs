//! Upstream forwarding.
//!
//! # Data Flow
//! ```text
//! Handler (resolved target, body, deadline)
//!     → ProxyMode::forward
//!         → breaker.try_acquire()        (fail fast: 503)
//!         → UpstreamClient::send          (transport failure / deadline: 502)
//!         → buffered.rs  (JSON body passthrough, outcome at headers)
//!         → streaming.rs (event-stream passthrough, outcome at stream end)
//! ```
//!
//! # Design Decisions
//! - Exactly one attempt per call; no retries
//! - Bodies are streamed frame by frame on both legs, never collected
//! - One deadline bounds headers and body; the breaker cooldown is separate
//! - Dropping the response body (caller went away) drops the upstream
//!   connection with it

pub mod buffered;
pub mod streaming;

use std::pin::Pin;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    response::Response,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};

use crate::http::request::X_REQUEST_ID;
use crate::resilience::{BreakerError, CircuitBreaker};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Breaker(#[from] BreakerError),

    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream body error: {0}")]
    Body(#[from] axum::Error),

    #[error("upstream request deadline exceeded")]
    Timeout,

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

/// How a route delivers the upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyMode {
    /// JSON response passed through with the upstream status.
    Buffered,
    /// Event stream forwarded chunk by chunk.
    Streaming,
}

impl ProxyMode {
    pub async fn forward(
        self,
        client: &UpstreamClient,
        breaker: &Arc<CircuitBreaker>,
        call: UpstreamCall,
    ) -> Result<Response, ProxyError> {
        match self {
            ProxyMode::Buffered => buffered::forward(client, breaker, call).await,
            ProxyMode::Streaming => streaming::forward(client, breaker, call).await,
        }
    }
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct UpstreamCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Bytes>,
    pub deadline: Instant,
    pub request_id: Option<HeaderValue>,
}

/// Shared pooled HTTP client for upstream calls. Registry entries may
/// advertise `http` or `https` home pages; both are accepted.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamClient {
    pub fn new() -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Self { client }
    }

    /// Send `call` and wait for response headers, bounded by its deadline.
    pub(crate) async fn send(
        &self,
        call: &UpstreamCall,
        accept: &'static str,
    ) -> Result<hyper::Response<Incoming>, ProxyError> {
        let mut builder = Request::builder()
            .method(call.method.clone())
            .uri(call.url.as_str())
            .header(header::ACCEPT, accept);
        if let Some(id) = &call.request_id {
            builder = builder.header(X_REQUEST_ID, id.clone());
        }
        let body = match &call.body {
            Some(bytes) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(bytes.clone())
            }
            None => Body::empty(),
        };
        let request = builder
            .body(body)
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

        match timeout_at(call.deadline, self.client.request(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProxyError::Timeout),
        }
    }
}

pub(crate) type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProxyError>> + Send>>;

/// Upstream body as a chunk stream that ends with [`ProxyError::Timeout`]
/// once `deadline` passes. Nothing is yielded after the first error.
pub(crate) fn body_with_deadline(body: Incoming, deadline: Instant) -> ChunkStream {
    let data = Body::new(body).into_data_stream();
    futures_util::stream::unfold(Some(data), move |state| async move {
        let mut data = state?;
        match timeout_at(deadline, data.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(data))),
            Ok(Some(Err(e))) => Some((Err(ProxyError::Body(e)), None)),
            Ok(None) => None,
            Err(_) => Some((Err(ProxyError::Timeout), None)),
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_https_target_starts_tls_handshake() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut first = [0u8; 1];
            socket.read_exact(&mut first).await.unwrap();
            first[0]
        });

        let call = UpstreamCall {
            method: Method::POST,
            url: format!("https://{}/recommendations", addr),
            body: None,
            deadline: Instant::now() + Duration::from_secs(2),
            request_id: None,
        };
        let client = UpstreamClient::new();
        let sent = tokio::spawn(async move { client.send(&call, "application/json").await.is_err() });

        // 0x16: TLS handshake record.
        assert_eq!(accept.await.unwrap(), 0x16);
        assert!(sent.await.unwrap());
    }
}
