//! Event-stream passthrough.
//!
//! Status and headers go out as soon as the upstream answers, with
//! `Content-Type: text/event-stream` and `Cache-Control: no-cache`. Each
//! upstream chunk becomes one response frame, in order.
//!
//! Breaker outcome:
//! - transport failure or deadline before headers: failure
//! - 5xx at headers: failure, 4xx: success (both settled immediately)
//! - otherwise settled when the stream ends: clean end is a success, a
//!   mid-stream error or the deadline is a failure
//! - caller disconnect drops the stream and its permit unsettled

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};
use futures_util::StreamExt;

use super::{body_with_deadline, ChunkStream, ProxyError, UpstreamCall, UpstreamClient};
use crate::resilience::{BreakerPermit, CircuitBreaker};

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection" | "keep-alive" | "transfer-encoding" | "te" | "trailer" | "upgrade" | "proxy-authenticate"
    )
}

pub async fn forward(
    client: &UpstreamClient,
    breaker: &Arc<CircuitBreaker>,
    call: UpstreamCall,
) -> Result<Response, ProxyError> {
    let permit = breaker.try_acquire()?;

    let upstream = match client.send(&call, "text/event-stream").await {
        Ok(upstream) => upstream,
        Err(e) => {
            permit.failure();
            tracing::warn!(url = %call.url, error = %e, "Upstream stream request failed");
            return Err(e);
        }
    };

    let status = upstream.status();
    let (parts, body) = upstream.into_parts();
    let chunks = body_with_deadline(body, call.deadline);

    let body = if status.is_success() {
        Body::from_stream(settle_on_end(chunks, permit, call.url.clone()))
    } else {
        if status.is_server_error() {
            tracing::warn!(url = %call.url, status = status.as_u16(), "Upstream stream returned server error");
        }
        permit.record_status(status.as_u16());
        Body::from_stream(chunks)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    copy_headers(&parts.headers, response.headers_mut());
    Ok(response)
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if is_hop_by_hop(name)
            || *name == header::CONTENT_LENGTH
            || *name == header::CONTENT_TYPE
            || *name == header::CACHE_CONTROL
        {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
    to.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    to.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
}

struct Settling {
    chunks: ChunkStream,
    permit: Option<BreakerPermit>,
    url: String,
    forwarded: usize,
}

fn settle_on_end(chunks: ChunkStream, permit: BreakerPermit, url: String) -> ChunkStream {
    let state = Settling {
        chunks,
        permit: Some(permit),
        url,
        forwarded: 0,
    };
    futures_util::stream::unfold(state, |mut st| async move {
        match st.chunks.next().await {
            Some(Ok(chunk)) => {
                st.forwarded += 1;
                Some((Ok(chunk), st))
            }
            Some(Err(e)) => {
                if let Some(permit) = st.permit.take() {
                    permit.failure();
                }
                tracing::warn!(url = %st.url, chunks = st.forwarded, error = %e, "Upstream stream aborted");
                Some((Err(e), st))
            }
            None => {
                if let Some(permit) = st.permit.take() {
                    permit.success();
                }
                tracing::debug!(url = %st.url, chunks = st.forwarded, "Upstream stream completed");
                None
            }
        }
    })
    .boxed()
}
