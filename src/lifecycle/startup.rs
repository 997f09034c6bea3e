//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (metrics exporter, lease keeper)
//! - Bind the listener and begin accepting traffic
//! - Stop everything on a signal
//!
//! # Design Decisions
//! - Fail fast: only configuration and binding errors are fatal
//! - Registry trouble never blocks startup; the lease keeper retries in the
//!   background while requests use the static fallback
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::GatewayConfig;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::net::{self, local_ip, ListenerError};
use crate::observability::metrics;
use crate::registry::{LeaseKeeper, RegistrationLease, RegistryClient};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    let registry = config
        .registry
        .enabled
        .then(|| RegistryClient::new(&config.registry.base_url));

    let mut keeper_task = None;
    let mut lease_status = None;
    if let Some(client) = &registry {
        let ip = local_ip::detect_local_ip();
        let host_name = local_ip::host_name();
        let lease = RegistrationLease::from_config(&config, &ip, host_name.as_deref());
        tracing::info!(
            app = %lease.app_name,
            instance_id = %lease.instance_id,
            ip = %lease.ip_addr,
            registry = %client.base_url(),
            "Starting lease keeper"
        );

        let keeper = LeaseKeeper::new(client.clone(), lease, config.registry.clone());
        lease_status = Some(keeper.status());
        keeper_task = Some(tokio::spawn(keeper.run(shutdown.subscribe())));
    }

    let listener = net::bind(&config.listener).await?;
    tracing::info!(
        downstream = %config.downstream.app_name,
        fallback = config.downstream.base_url.as_deref().unwrap_or("-"),
        request_timeout_ms = config.timeouts.request_ms,
        "api-gateway listening"
    );

    let server = HttpServer::new(AppState::new(config, registry, lease_status));

    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        on_signal.trigger();
    });

    let result = server.run(listener, shutdown.subscribe()).await;

    // Wait for the keeper to observe shutdown before returning.
    shutdown.trigger();
    if let Some(task) = keeper_task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Lease keeper task ended abnormally");
        }
    }

    tracing::info!("Shutdown complete");
    result.map_err(StartupError::from)
}
