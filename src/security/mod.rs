//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (derive client identity)
//!     → rate_limit.rs (per-client token bucket, 429 on exhaustion)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before any routing, registry or breaker work
//! - A rejected request never touches an upstream

pub mod headers;
pub mod rate_limit;

pub use headers::client_identity;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
