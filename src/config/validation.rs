//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds > 0, port valid)
//! - Check that URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be non-zero"));
    }

    if config.registry.enabled {
        if let Err(e) = Url::parse(&config.registry.base_url) {
            errors.push(ValidationError::new(
                "registry.base_url",
                format!("invalid URL '{}': {}", config.registry.base_url, e),
            ));
        }
        if config.registry.app_name.trim().is_empty() {
            errors.push(ValidationError::new("registry.app_name", "must not be empty"));
        }
        if config.registry.register_retry_ms == 0 {
            errors.push(ValidationError::new("registry.register_retry_ms", "must be > 0"));
        }
        if config.registry.heartbeat_interval_secs == 0 {
            errors.push(ValidationError::new("registry.heartbeat_interval_secs", "must be > 0"));
        }
    }

    if config.downstream.app_name.trim().is_empty() {
        errors.push(ValidationError::new("downstream.app_name", "must not be empty"));
    }
    if let Some(base) = &config.downstream.base_url {
        if let Err(e) = Url::parse(base) {
            errors.push(ValidationError::new(
                "downstream.base_url",
                format!("invalid URL '{}': {}", base, e),
            ));
        }
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be > 0"));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_second == 0 {
            errors.push(ValidationError::new("rate_limit.requests_per_second", "must be > 0"));
        }
        if config.rate_limit.burst_size == 0 {
            errors.push(ValidationError::new("rate_limit.burst_size", "must be > 0"));
        }
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be > 0"));
    }
    if config.circuit_breaker.half_open_max_probes == 0 {
        errors.push(ValidationError::new("circuit_breaker.half_open_max_probes", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.port = 0;
        config.circuit_breaker.failure_threshold = 0;
        config.downstream.base_url = Some("not a url".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.port", "downstream.base_url", "circuit_breaker.failure_threshold"]
        );
    }

    #[test]
    fn test_zero_registration_retry_rejected() {
        let mut config = GatewayConfig::default();
        config.registry.register_retry_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "registry.register_retry_ms");
    }

    #[test]
    fn test_disabled_registry_skips_url_check() {
        let mut config = GatewayConfig::default();
        config.registry.enabled = false;
        config.registry.base_url = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
