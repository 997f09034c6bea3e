//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Proxied request (after rate limiting)
//!     → router.rs (fixed route: upstream path + proxy mode)
//!     → resolver.rs (registry lookup, else static fallback, else 500)
//!     → proxy (breaker-gated dispatch)
//! ```
//!
//! # Design Decisions
//! - Routes are fixed; the target is resolved per request, never cached
//! - Deterministic: the first UP instance wins

pub mod resolver;
pub mod router;

pub use resolver::TargetResolver;
pub use router::{ProxyRoute, AGENT, AGENT_STREAM, PROXY_ROUTES};
