//! Per-client token-bucket rate limiting.
//!
//! Every client identity (see [`client_identity`]) gets its own bucket on
//! first sight. Buckets are never evicted; the bucket count is exported as a
//! gauge so growth stays visible.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::security::headers::client_identity;

/// A single client's token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    rate: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate: f64::from(requests_per_second),
            burst: f64::from(burst_size),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Consume one token for `identity`. Never blocks.
    pub fn allow(&self, identity: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|p| p.into_inner());
        match buckets.get_mut(identity) {
            Some(bucket) => bucket.try_acquire(self.burst, self.rate),
            None => {
                let mut bucket = TokenBucket::new(self.burst);
                let allowed = bucket.try_acquire(self.burst, self.rate);
                buckets.insert(identity.to_string(), bucket);
                metrics::record_rate_limit_buckets(buckets.len());
                allowed
            }
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// Middleware rejecting over-limit clients with 429 before routing.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), peer);

    if limiter.allow(&identity) {
        next.run(request).await
    } else {
        tracing::warn!(client = %identity, "Rate limit exceeded");
        metrics::record_rate_limited();
        GatewayError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let limiter = RateLimiter::new(100, 200);
        for i in 0..200 {
            assert!(limiter.allow("10.0.0.1"), "request {} should pass", i + 1);
        }
        assert!(!limiter.allow("10.0.0.1"));
        // Other clients are unaffected.
        assert!(limiter.allow("10.0.0.2"));
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_after_wait() {
        let limiter = RateLimiter::new(100, 200);
        for _ in 0..200 {
            limiter.allow("c");
        }
        assert!(!limiter.allow("c"));

        tokio::time::advance(Duration::from_millis(15)).await;
        assert!(limiter.allow("c"));
        assert!(!limiter.allow("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_cadence_never_rejected() {
        let limiter = RateLimiter::new(100, 200);
        for _ in 0..1_000 {
            assert!(limiter.allow("steady"));
            tokio::time::advance(Duration::from_millis(20)).await;
        }
    }
}
