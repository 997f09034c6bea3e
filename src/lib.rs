//! API gateway with registry-based discovery, circuit breaking and
//! per-client rate limiting.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;
pub mod registry;
pub mod routing;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
