//! Read-only operational introspection.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/circuit-breaker", get(get_circuit_breaker))
        .route("/admin/circuit-breakers", get(get_circuit_breakers))
        .route("/admin/registry", get(get_registry))
}
