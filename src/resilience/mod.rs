//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an upstream:
//!     → circuit_breaker.rs (admit or fail fast, record outcome)
//!
//! Call to the registry:
//!     → backoff.rs (delay between registration attempts)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline (enforced by the caller)
//! - No automatic retries of proxied requests; one attempt per call
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;

pub use circuit_breaker::{BreakerError, BreakerPermit, BreakerRegistry, BreakerSnapshot, CircuitBreaker, Counts, Phase};
