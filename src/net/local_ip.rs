//! Local address detection for registration.
//!
//! Order: `POD_IP`, then `HOSTNAME` when it is itself an IP, then the source
//! address of an outbound UDP route, then `127.0.0.1`. The UDP socket is
//! connected but never sends anything.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

pub fn detect_local_ip() -> String {
    detect_with(|key| std::env::var(key).ok(), outbound_ipv4)
}

fn detect_with<E, R>(env: E, route: R) -> String
where
    E: Fn(&str) -> Option<String>,
    R: FnOnce() -> Option<IpAddr>,
{
    if let Some(ip) = env("POD_IP").map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        return ip;
    }
    if let Some(ip) = env("HOSTNAME").and_then(|h| h.trim().parse::<IpAddr>().ok()) {
        return ip.to_string();
    }
    route()
        .filter(|ip| !ip.is_loopback() && !ip.is_unspecified())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .to_string()
}

fn outbound_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// Host name for registries that prefer names over addresses.
pub fn host_name() -> Option<String> {
    std::env::var("HOSTNAME").ok().filter(|h| !h.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn test_pod_ip_wins() {
        let ip = detect_with(env(&[("POD_IP", "10.2.3.4"), ("HOSTNAME", "10.9.9.9")]), || None);
        assert_eq!(ip, "10.2.3.4");
    }

    #[test]
    fn test_hostname_only_when_ip() {
        let ip = detect_with(env(&[("HOSTNAME", "10.9.9.9")]), || None);
        assert_eq!(ip, "10.9.9.9");

        let ip = detect_with(env(&[("HOSTNAME", "gateway-7d9f")]), || "172.17.0.3".parse().ok());
        assert_eq!(ip, "172.17.0.3");
    }

    #[test]
    fn test_loopback_default() {
        assert_eq!(detect_with(env(&[]), || None), "127.0.0.1");
        assert_eq!(detect_with(env(&[]), || "127.0.0.1".parse().ok()), "127.0.0.1");
    }
}
