//! Registry HTTP client with per-call deadlines.
//!
//! # Responsibilities
//! - Register this gateway's lease (XML document)
//! - Renew the lease (empty-body PUT)
//! - Resolve the base URL of a named application (JSON listing)
//!
//! Every call takes a caller-supplied deadline; an elapsed deadline surfaces
//! as [`RegistryError::Timeout`], never a hang.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tokio::time::timeout;

use crate::observability::metrics;
use crate::registry::types::{
    select_instance, AppResponse, RegistrationLease, RegistryError, RegistryResult,
    ServiceInstance,
};

/// Client for the registry's REST API.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: Client,
}

impl RegistryClient {
    /// Create a client for the registry at `base_url` (e.g. `http://host:8761/eureka`).
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(base_url: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn app_url(&self, app: &str) -> String {
        format!("{}/apps/{}", self.base_url, app.to_uppercase())
    }

    /// Submit the lease. Any non-2xx answer is a [`RegistryError::Rejected`].
    pub async fn register(&self, lease: &RegistrationLease, deadline: Duration) -> RegistryResult<()> {
        let request = self
            .http
            .post(self.app_url(&lease.app_name))
            .header(CONTENT_TYPE, "application/xml")
            .body(lease.to_xml());

        let result = with_deadline(deadline, async {
            let response = request.send().await?;
            expect_success("register", response).await
        })
        .await;

        metrics::record_registry_call("register", result.is_ok());
        result
    }

    /// Renew the lease of `instance_id`.
    pub async fn heartbeat(&self, app: &str, instance_id: &str, deadline: Duration) -> RegistryResult<()> {
        let url = format!("{}/{}", self.app_url(app), instance_id);
        let request = self.http.put(url);

        let result = with_deadline(deadline, async {
            let response = request.send().await?;
            expect_success("heartbeat", response).await
        })
        .await;

        metrics::record_registry_call("heartbeat", result.is_ok());
        result
    }

    /// Resolve `app` to a single instance (first `UP`, else first listed).
    pub async fn resolve(&self, app: &str, deadline: Duration) -> RegistryResult<ServiceInstance> {
        let request = self.http.get(self.app_url(app)).header(ACCEPT, "application/json");

        let result = with_deadline(deadline, async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            if status != reqwest::StatusCode::OK {
                return Err(RegistryError::UnexpectedStatus {
                    app: app.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            let listing: AppResponse = serde_json::from_str(&body)?;
            let instances = listing
                .application
                .map(|a| a.instance.into_vec())
                .unwrap_or_default();
            select_instance(app, &instances)
        })
        .await;

        metrics::record_registry_call("resolve", result.is_ok());
        result
    }

    /// Resolve `app` and return only its base URL.
    pub async fn resolve_base_url(&self, app: &str, deadline: Duration) -> RegistryResult<String> {
        self.resolve(app, deadline).await.map(|i| i.base_url)
    }
}

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> RegistryResult<T>
where
    F: Future<Output = RegistryResult<T>>,
{
    timeout(deadline, fut)
        .await
        .unwrap_or(Err(RegistryError::Timeout(deadline)))
}

async fn expect_success(op: &'static str, response: reqwest::Response) -> RegistryResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(RegistryError::Rejected {
        op,
        status: status.as_u16(),
        body,
    })
}
