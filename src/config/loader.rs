//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An environment override whose value could not be used. The setting it
/// names keeps its previous value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    pub key: &'static str,
    pub value: String,
}

/// Build the effective configuration: defaults, then the optional file,
/// then environment overrides. Validation runs once on the final result.
///
/// Unusable overrides are returned rather than logged so the caller can
/// report them once logging is up.
pub fn load(path: Option<&Path>) -> Result<(GatewayConfig, Vec<IgnoredOverride>), ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    let ignored = apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok((config, ignored))
}

/// Apply the recognized environment variables on top of `config`.
///
/// Blank values count as unset. Unparseable values keep the current setting
/// and are reported back.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Vec<IgnoredOverride>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let mut ignored = Vec::new();

    if let Some(port) = get("PORT") {
        match port.parse() {
            Ok(port) => config.listener.port = port,
            Err(_) => ignored.push(IgnoredOverride { key: "PORT", value: port }),
        }
    }
    if let Some(url) = get("EUREKA_SERVER_URL") {
        config.registry.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(name) = get("APP_NAME") {
        config.registry.app_name = name;
    }
    if let Some(id) = get("INSTANCE_ID") {
        config.registry.instance_id = Some(id);
    }
    if let Some(flag) = get("PREFER_IP") {
        config.registry.prefer_ip = flag.eq_ignore_ascii_case("true");
    }
    if let Some(name) = get("AGENT_APP_NAME").or_else(|| get("FLASK_APP_NAME")) {
        config.downstream.app_name = name;
    }
    if let Some(url) = get("AGENT_BASE_URL").or_else(|| get("FLASK_BASE_URL")) {
        config.downstream.base_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(raw) = get("REQUEST_TIMEOUT") {
        match parse_timeout_ms(&raw) {
            Some(ms) => config.timeouts.request_ms = ms,
            None => ignored.push(IgnoredOverride { key: "REQUEST_TIMEOUT", value: raw }),
        }
    }

    ignored
}

/// Whole milliseconds of a duration such as `120s`, `1m30s` or `500ms`.
/// Zero, sub-millisecond and out-of-range values are rejected.
fn parse_timeout_ms(raw: &str) -> Option<u64> {
    let duration = humantime::parse_duration(raw).ok()?;
    u64::try_from(duration.as_millis()).ok().filter(|ms| *ms > 0)
}
