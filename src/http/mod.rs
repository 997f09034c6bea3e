//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, span, metrics)
//!     → [security: rate limit]
//!     → handlers.rs / docs.rs / admin
//!     → [routing + proxy for /agent routes]
//!     → response.rs (JSON error bodies)
//!     → Send to client
//! ```

pub mod docs;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::GatewayError;
pub use server::{AppState, HttpServer};
