//! Lease keeping: initial registration with retry, then periodic heartbeats.
//!
//! # Lifecycle
//! ```text
//! NotRegistered ──register ok──▶ Registered ──heartbeat (every interval)──┐
//!      ▲   │                          ▲                                   │
//!      └───┘ retry after backoff      └───────────────────────────────────┘
//! ```
//!
//! A failed heartbeat is logged and skipped; it never triggers
//! re-registration and never stops the loop. Both phases exit on shutdown.
//! All waits use tokio time, so a paused test clock drives the loop.

use std::future::Future;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::RegistryConfig;
use crate::registry::client::RegistryClient;
use crate::registry::types::{LeaseState, RegistrationLease, RegistryResult};
use crate::resilience::backoff::calculate_backoff;

/// The registry operations the lease keeper needs.
pub trait Registrar: Send + Sync + 'static {
    fn register(
        &self,
        lease: &RegistrationLease,
        deadline: std::time::Duration,
    ) -> impl Future<Output = RegistryResult<()>> + Send;

    fn heartbeat(
        &self,
        lease: &RegistrationLease,
        deadline: std::time::Duration,
    ) -> impl Future<Output = RegistryResult<()>> + Send;
}

impl Registrar for RegistryClient {
    async fn register(&self, lease: &RegistrationLease, deadline: std::time::Duration) -> RegistryResult<()> {
        RegistryClient::register(self, lease, deadline).await
    }

    async fn heartbeat(&self, lease: &RegistrationLease, deadline: std::time::Duration) -> RegistryResult<()> {
        RegistryClient::heartbeat(self, &lease.app_name, &lease.instance_id, deadline).await
    }
}

/// Point-in-time view of the lease for admin introspection.
#[derive(Debug, Clone, Serialize)]
pub struct LeaseSnapshot {
    pub instance_id: String,
    pub app_name: String,
    pub state: LeaseState,
    pub registration_attempts: u64,
    pub heartbeats_sent: u64,
    pub heartbeat_failures: u64,
    /// Unix seconds of the last successful heartbeat.
    pub last_heartbeat_at: Option<u64>,
    pub last_error: Option<String>,
}

/// Shared, lock-guarded lease status written by the keeper and read by admin.
#[derive(Debug)]
pub struct LeaseStatus {
    inner: Mutex<LeaseSnapshot>,
}

impl LeaseStatus {
    pub fn new(lease: &RegistrationLease) -> Self {
        Self {
            inner: Mutex::new(LeaseSnapshot {
                instance_id: lease.instance_id.clone(),
                app_name: lease.app_name.clone(),
                state: LeaseState::NotRegistered,
                registration_attempts: 0,
                heartbeats_sent: 0,
                heartbeat_failures: 0,
                last_heartbeat_at: None,
                last_error: None,
            }),
        }
    }

    pub fn snapshot(&self) -> LeaseSnapshot {
        self.lock().clone()
    }

    pub fn state(&self) -> LeaseState {
        self.lock().state
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LeaseSnapshot> {
        // A panic while holding this lock leaves plain counters behind; keep serving them.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_registration(&self, result: &RegistryResult<()>) {
        let mut s = self.lock();
        s.registration_attempts += 1;
        match result {
            Ok(()) => {
                s.state = LeaseState::Registered;
                s.last_error = None;
            }
            Err(e) => s.last_error = Some(e.to_string()),
        }
    }

    fn record_heartbeat(&self, result: &RegistryResult<()>) {
        let mut s = self.lock();
        s.heartbeats_sent += 1;
        match result {
            Ok(()) => {
                s.last_heartbeat_at = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .ok()
                    .map(|d| d.as_secs());
                s.last_error = None;
            }
            Err(e) => {
                s.heartbeat_failures += 1;
                s.last_error = Some(e.to_string());
            }
        }
    }
}

/// Background task keeping this gateway's lease alive.
pub struct LeaseKeeper<R: Registrar = RegistryClient> {
    registrar: R,
    lease: RegistrationLease,
    config: RegistryConfig,
    status: Arc<LeaseStatus>,
}

impl<R: Registrar> LeaseKeeper<R> {
    pub fn new(registrar: R, lease: RegistrationLease, config: RegistryConfig) -> Self {
        let status = Arc::new(LeaseStatus::new(&lease));
        Self {
            registrar,
            lease,
            config,
            status,
        }
    }

    /// Handle for observing the lease while the keeper runs.
    pub fn status(&self) -> Arc<LeaseStatus> {
        self.status.clone()
    }

    /// Run until shutdown: register (retrying), then heartbeat forever.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tokio::select! {
            _ = self.register_until_success() => {}
            _ = shutdown.recv() => {
                tracing::info!("Lease keeper stopped before registration completed");
                return;
            }
        }

        tracing::info!(
            app = %self.lease.app_name,
            instance_id = %self.lease.instance_id,
            "Registered with service registry"
        );

        let period = self.config.heartbeat_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.heartbeat_once().await,
                _ = shutdown.recv() => {
                    tracing::info!("Lease keeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn register_until_success(&self) {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            let result = self
                .registrar
                .register(&self.lease, self.config.register_timeout())
                .await;
            self.status.record_registration(&result);

            let Err(e) = result else {
                return;
            };

            let delay = calculate_backoff(
                attempt,
                self.config.register_retry(),
                self.config.register_retry_max(),
            );
            tracing::warn!(
                error = %e,
                attempt,
                retry_in = ?delay,
                "Registry registration failed"
            );
            time::sleep(delay).await;
        }
    }

    async fn heartbeat_once(&self) {
        let result = self
            .registrar
            .heartbeat(&self.lease, self.config.heartbeat_timeout())
            .await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, instance_id = %self.lease.instance_id, "Registry heartbeat failed");
        } else {
            tracing::debug!(instance_id = %self.lease.instance_id, "Heartbeat sent");
        }
        self.status.record_heartbeat(&result);
    }
}
