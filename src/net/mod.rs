//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (bind the listening socket)
//!     → local_ip.rs (address advertised to the registry)
//!     → Hand off to HTTP layer
//! ```

pub mod listener;
pub mod local_ip;

pub use listener::{bind, ListenerError};
pub use local_ip::detect_local_ip;
