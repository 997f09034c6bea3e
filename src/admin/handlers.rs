use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::registry::LeaseSnapshot;
use crate::resilience::{BreakerSnapshot, Counts};

#[derive(Debug, Serialize)]
pub struct BreakerStatus {
    pub state: &'static str,
    pub counts: Counts,
}

#[derive(Debug, Serialize)]
pub struct RegistryStatus {
    pub enabled: bool,
    pub registry_url: Option<String>,
    pub registered: bool,
    #[serde(flatten)]
    pub lease: Option<LeaseSnapshot>,
}

/// Breaker guarding the downstream agent service.
pub async fn get_circuit_breaker(State(state): State<AppState>) -> Json<BreakerStatus> {
    let snapshot = state
        .breakers
        .get_or_create(state.resolver.app_name())
        .snapshot();
    Json(BreakerStatus {
        state: snapshot.state,
        counts: snapshot.counts,
    })
}

pub async fn get_circuit_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshots())
}

pub async fn get_registry(State(state): State<AppState>) -> Json<RegistryStatus> {
    let lease = state.lease.as_ref().map(|l| l.snapshot());
    let enabled = state.config.registry.enabled;
    Json(RegistryStatus {
        enabled,
        registry_url: enabled.then(|| state.config.registry.base_url.clone()),
        registered: lease
            .as_ref()
            .is_some_and(|l| l.state == crate::registry::LeaseState::Registered),
        lease,
    })
}
