//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file (or no file) is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (port, bind host, body limits).
    pub listener: ListenerConfig,

    /// Service registry settings, including this gateway's own identity.
    pub registry: RegistryConfig,

    /// The downstream application the proxy routes forward to.
    pub downstream: DownstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker thresholds shared by every upstream.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Listen port. Also advertised to the registry.
    pub port: u16,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl ListenerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Enable registration, heartbeats and registry resolution. When off,
    /// only the static downstream base URL is used.
    pub enabled: bool,

    /// Registry base URL, e.g. `http://localhost:8761/eureka`.
    pub base_url: String,

    /// This gateway's application name.
    pub app_name: String,

    /// Operator-supplied instance id. Derived from app/ip/port when absent.
    pub instance_id: Option<String>,

    /// Advertise the IP address rather than a host name.
    pub prefer_ip: bool,

    /// Deadline for a single registration attempt in seconds.
    pub register_timeout_secs: u64,

    /// Delay between failed registration attempts in milliseconds.
    pub register_retry_ms: u64,

    /// Upper bound for the retry delay. Equal to `register_retry_ms` for a
    /// fixed delay; larger values make the delay grow exponentially.
    pub register_retry_max_ms: u64,

    /// Interval between heartbeats in seconds.
    pub heartbeat_interval_secs: u64,

    /// Deadline for a single heartbeat in seconds.
    pub heartbeat_timeout_secs: u64,
}

impl RegistryConfig {
    pub fn register_timeout(&self) -> Duration {
        Duration::from_secs(self.register_timeout_secs)
    }

    pub fn register_retry(&self) -> Duration {
        Duration::from_millis(self.register_retry_ms)
    }

    pub fn register_retry_max(&self) -> Duration {
        Duration::from_millis(self.register_retry_max_ms.max(self.register_retry_ms))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:8761/eureka".to_string(),
            app_name: "API-GATEWAY".to_string(),
            instance_id: None,
            prefer_ip: true,
            register_timeout_secs: 10,
            register_retry_ms: 5_000,
            register_retry_max_ms: 5_000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 5,
        }
    }
}

/// Downstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Application name looked up in the registry.
    pub app_name: String,

    /// Static base URL used when registry resolution fails.
    pub base_url: Option<String>,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            app_name: "AGENT-SERVICE".to_string(),
            base_url: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request deadline in milliseconds. Bounds registry resolution and
    /// the whole upstream exchange, stream bodies included.
    pub request_ms: u64,

    /// Deadline for best-effort documentation aggregation in milliseconds.
    pub docs_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn docs(&self) -> Duration {
        Duration::from_millis(self.docs_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 120_000,
            docs_ms: 5_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Token replenishment per second per client.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 100,
            burst_size: 200,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in CLOSED that trip the breaker.
    pub failure_threshold: u32,

    /// Time spent OPEN before a probe is allowed, in seconds.
    pub cooldown_secs: u64,

    /// Concurrent probes allowed while HALF_OPEN.
    pub half_open_max_probes: u32,
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 30,
            half_open_max_probes: 1,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "api_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
