//! Target resolution: registry first, static fallback second.
//!
//! Resolution runs on every request and is bounded by the request deadline.
//! Any registry error (unreachable, timeout, no instances, malformed entry)
//! falls back to the configured base URL. `None` means neither produced a
//! target.

use tokio::time::Instant;

use crate::config::GatewayConfig;
use crate::registry::{RegistryClient, ServiceInstance};

#[derive(Debug, Clone)]
pub struct TargetResolver {
    registry: Option<RegistryClient>,
    app_name: String,
    fallback: Option<String>,
}

impl TargetResolver {
    pub fn new(registry: Option<RegistryClient>, app_name: &str, fallback: Option<String>) -> Self {
        Self {
            registry,
            app_name: app_name.to_string(),
            fallback: fallback.filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn from_config(config: &GatewayConfig, registry: Option<RegistryClient>) -> Self {
        Self::new(registry, &config.downstream.app_name, config.downstream.base_url.clone())
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub async fn resolve(&self, deadline: Instant) -> Option<ServiceInstance> {
        if let Some(registry) = &self.registry {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match registry.resolve(&self.app_name, remaining).await {
                Ok(instance) => {
                    tracing::debug!(app = %self.app_name, base_url = %instance.base_url, "Resolved via registry");
                    return Some(instance);
                }
                Err(e) => {
                    tracing::warn!(app = %self.app_name, error = %e, "Registry resolution failed, using fallback");
                }
            }
        }

        match &self.fallback {
            Some(base) => Some(ServiceInstance::fallback(&self.app_name, base)),
            None => {
                tracing::error!(app = %self.app_name, "No downstream target available");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InstanceSource;
    use std::time::Duration;

    #[tokio::test]
    async fn test_static_fallback_without_registry() {
        let resolver = TargetResolver::new(None, "AGENT-SERVICE", Some("http://agent:5000/".into()));
        let target = resolver.resolve(Instant::now() + Duration::from_secs(1)).await.unwrap();
        assert_eq!(target.base_url, "http://agent:5000");
        assert_eq!(target.source, InstanceSource::StaticFallback);
    }

    #[tokio::test]
    async fn test_no_target() {
        let resolver = TargetResolver::new(None, "AGENT-SERVICE", Some("  ".into()));
        assert!(resolver.resolve(Instant::now() + Duration::from_secs(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_registry_falls_back() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let registry = RegistryClient::new(&format!("http://{}/eureka", addr));
        let resolver = TargetResolver::new(Some(registry), "AGENT-SERVICE", Some("http://fallback:5000".into()));
        let target = resolver.resolve(Instant::now() + Duration::from_secs(2)).await.unwrap();
        assert_eq!(target.base_url, "http://fallback:5000");
    }
}
