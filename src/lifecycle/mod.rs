//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config (already validated) → metrics → lease keeper → bind → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, lease keeper exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then background tasks, then listener
//! - The process never deregisters; the registry expires the lease

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
