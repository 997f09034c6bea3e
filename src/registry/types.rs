//! Registry data types, wire format and error definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GatewayConfig;

/// Errors that can occur while talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Connection, DNS or protocol failure.
    #[error("registry transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller's deadline elapsed before the registry answered.
    #[error("registry call timed out after {0:?}")]
    Timeout(Duration),

    /// Registration or heartbeat answered with a non-2xx status.
    #[error("registry {op} failed: {status}: {body}")]
    Rejected {
        op: &'static str,
        status: u16,
        body: String,
    },

    /// Resolution answered with a non-200 status.
    #[error("resolve {app} failed: {status}: {body}")]
    UnexpectedStatus {
        app: String,
        status: u16,
        body: String,
    },

    /// The instance listing could not be decoded.
    #[error("invalid registry response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The application has no registered instances.
    #[error("no instances for {0}")]
    NoInstances(String),

    /// The chosen instance has neither a home page URL nor ip and port.
    #[error("instance missing url fields for {0}")]
    MalformedInstance(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Where a resolved instance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceSource {
    Registry,
    StaticFallback,
}

/// A downstream endpoint resolved for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInstance {
    pub app_name: String,
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub status: String,
    pub source: InstanceSource,
}

impl ServiceInstance {
    /// A statically configured target.
    pub fn fallback(app_name: &str, base_url: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            status: "UNKNOWN".to_string(),
            source: InstanceSource::StaticFallback,
        }
    }

    /// Join a path onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn is_up(&self) -> bool {
        self.status.eq_ignore_ascii_case("UP")
    }
}

/// Lease state of this gateway as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    NotRegistered,
    Registered,
}

/// This gateway's registration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationLease {
    pub instance_id: String,
    /// Upper-cased application name, as used on the wire.
    pub app_name: String,
    pub host_name: String,
    pub ip_addr: String,
    pub port: u16,
    pub home_page_url: String,
    pub status_page_url: String,
    pub health_check_url: String,
}

impl RegistrationLease {
    /// Build the lease from configuration and the detected local address.
    ///
    /// The instance id is `{lowercase app}:{ip}:{port}` unless the operator
    /// supplied one. The host name is the IP unless `prefer_ip` is off and a
    /// host name is known.
    pub fn from_config(config: &GatewayConfig, ip: &str, host_name: Option<&str>) -> Self {
        let registry = &config.registry;
        let port = config.listener.port;
        let instance_id = registry.instance_id.clone().unwrap_or_else(|| {
            format!("{}:{}:{}", registry.app_name.to_lowercase(), ip, port)
        });
        let host_name = match host_name {
            Some(name) if !registry.prefer_ip => name.to_string(),
            _ => ip.to_string(),
        };
        let base = format!("http://{}:{}", ip, port);

        Self {
            instance_id,
            app_name: registry.app_name.to_uppercase(),
            host_name,
            ip_addr: ip.to_string(),
            port,
            home_page_url: format!("{}/", base),
            status_page_url: format!("{}/health", base),
            health_check_url: format!("{}/health", base),
        }
    }

    /// Render the XML instance document accepted by the registry.
    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<instance>
  <instanceId>{instance_id}</instanceId>
  <hostName>{host_name}</hostName>
  <app>{app}</app>
  <ipAddr>{ip}</ipAddr>
  <status>UP</status>
  <port enabled="true">{port}</port>
  <securePort enabled="false">443</securePort>
  <homePageUrl>{home}</homePageUrl>
  <statusPageUrl>{status}</statusPageUrl>
  <healthCheckUrl>{health}</healthCheckUrl>
  <dataCenterInfo class="com.netflix.appinfo.InstanceInfo$DefaultDataCenterInfo">
    <name>MyOwn</name>
  </dataCenterInfo>
</instance>"#,
            instance_id = XmlEscaped(&self.instance_id),
            host_name = XmlEscaped(&self.host_name),
            app = XmlEscaped(&self.app_name),
            ip = XmlEscaped(&self.ip_addr),
            port = self.port,
            home = XmlEscaped(&self.home_page_url),
            status = XmlEscaped(&self.status_page_url),
            health = XmlEscaped(&self.health_check_url),
        )
    }
}

struct XmlEscaped<'a>(&'a str);

impl fmt::Display for XmlEscaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&apos;")?,
                c => write!(f, "{}", c)?,
            }
        }
        Ok(())
    }
}

// --- Wire format of `GET /apps/{APP}` ---

#[derive(Debug, Deserialize)]
pub(crate) struct AppResponse {
    #[serde(default)]
    pub application: Option<Application>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Application {
    #[serde(default)]
    pub instance: OneOrMany<InstanceRecord>,
}

/// The registry collapses single-element lists into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// One instance entry in the registry listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub home_page_url: Option<String>,
    #[serde(default)]
    pub ip_addr: Option<String>,
    #[serde(default)]
    pub port: Option<PortField>,
}

/// `{"$": 8080, "@enabled": "true"}`; some registries send the number as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct PortField {
    #[serde(rename = "$")]
    pub value: PortValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u16),
    Text(String),
}

impl InstanceRecord {
    fn port(&self) -> Option<u16> {
        let port = match &self.port.as_ref()?.value {
            PortValue::Number(n) => *n,
            PortValue::Text(s) => s.trim().parse().ok()?,
        };
        (port != 0).then_some(port)
    }

    fn base_url(&self) -> Option<String> {
        if let Some(home) = self.home_page_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(home.trim_end_matches('/').to_string());
        }
        let ip = self.ip_addr.as_deref().filter(|ip| !ip.is_empty())?;
        Some(format!("http://{}:{}", ip, self.port()?))
    }
}

/// Pick the instance to route to: the first `UP` instance, else the first
/// instance of any status.
pub fn select_instance(app: &str, instances: &[InstanceRecord]) -> RegistryResult<ServiceInstance> {
    let chosen = instances
        .iter()
        .find(|i| i.status.eq_ignore_ascii_case("UP"))
        .or_else(|| instances.first())
        .ok_or_else(|| RegistryError::NoInstances(app.to_string()))?;

    let base_url = chosen
        .base_url()
        .ok_or_else(|| RegistryError::MalformedInstance(app.to_string()))?;

    Ok(ServiceInstance {
        app_name: app.to_string(),
        base_url,
        status: chosen.status.clone(),
        source: InstanceSource::Registry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str, home: Option<&str>) -> InstanceRecord {
        InstanceRecord {
            status: status.to_string(),
            home_page_url: home.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_up_instance_wins() {
        let instances = vec![
            InstanceRecord {
                status: "DOWN".into(),
                ip_addr: Some("10.0.0.9".into()),
                port: Some(PortField { value: PortValue::Number(9000) }),
                ..Default::default()
            },
            record("UP", Some("http://a:5000/")),
            record("UP", Some("http://b:5000/")),
        ];

        let chosen = select_instance("AGENT-SERVICE", &instances).unwrap();
        assert_eq!(chosen.base_url, "http://a:5000");
        assert_eq!(chosen.source, InstanceSource::Registry);
    }

    #[test]
    fn test_status_is_case_insensitive() {
        let instances = vec![record("STARTING", Some("http://x")), record("up", Some("http://y"))];
        assert_eq!(select_instance("APP", &instances).unwrap().base_url, "http://y");
    }

    #[test]
    fn test_falls_back_to_first_when_none_up() {
        let instances = vec![record("DOWN", Some("http://first")), record("OUT_OF_SERVICE", Some("http://second"))];
        let chosen = select_instance("APP", &instances).unwrap();
        assert_eq!(chosen.base_url, "http://first");
        assert!(!chosen.is_up());
    }

    #[test]
    fn test_empty_list_is_no_instances() {
        let err = select_instance("APP", &[]).unwrap_err();
        assert!(matches!(err, RegistryError::NoInstances(app) if app == "APP"));
    }

    #[test]
    fn test_synthesizes_url_from_ip_and_port() {
        let json = r#"{"status":"UP","ipAddr":"10.1.2.3","port":{"$":5000,"@enabled":"true"}}"#;
        let inst: InstanceRecord = serde_json::from_str(json).unwrap();
        let chosen = select_instance("APP", &[inst]).unwrap();
        assert_eq!(chosen.base_url, "http://10.1.2.3:5000");
    }

    #[test]
    fn test_missing_address_is_malformed() {
        let inst = InstanceRecord {
            status: "UP".into(),
            ip_addr: Some("10.1.2.3".into()),
            port: Some(PortField { value: PortValue::Number(0) }),
            ..Default::default()
        };
        assert!(matches!(
            select_instance("APP", &[inst]),
            Err(RegistryError::MalformedInstance(_))
        ));
    }

    #[test]
    fn test_single_instance_object_form() {
        let json = r#"{"application":{"name":"APP","instance":{"status":"UP","homePageUrl":"http://solo/"}}}"#;
        let resp: AppResponse = serde_json::from_str(json).unwrap();
        let instances = resp.application.unwrap().instance.into_vec();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].home_page_url.as_deref(), Some("http://solo/"));
    }

    #[test]
    fn test_lease_from_config() {
        let mut config = GatewayConfig::default();
        config.listener.port = 8080;
        let lease = RegistrationLease::from_config(&config, "10.0.0.5", Some("gw-host"));

        assert_eq!(lease.instance_id, "api-gateway:10.0.0.5:8080");
        assert_eq!(lease.app_name, "API-GATEWAY");
        assert_eq!(lease.host_name, "10.0.0.5");
        assert_eq!(lease.health_check_url, "http://10.0.0.5:8080/health");

        config.registry.prefer_ip = false;
        config.registry.instance_id = Some("custom".into());
        let lease = RegistrationLease::from_config(&config, "10.0.0.5", Some("gw-host"));
        assert_eq!(lease.instance_id, "custom");
        assert_eq!(lease.host_name, "gw-host");
    }

    #[test]
    fn test_xml_document() {
        let mut lease = RegistrationLease::from_config(&GatewayConfig::default(), "10.0.0.5", None);
        lease.instance_id = "a&b".into();
        let xml = lease.to_xml();

        assert!(xml.contains("<instanceId>a&amp;b</instanceId>"));
        assert!(xml.contains("<app>API-GATEWAY</app>"));
        assert!(xml.contains(r#"<port enabled="true">8080</port>"#));
        assert!(xml.contains("<homePageUrl>http://10.0.0.5:8080/</homePageUrl>"));
        assert!(xml.contains("<name>MyOwn</name>"));
    }
}
