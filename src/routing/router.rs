//! Proxy route table.
//!
//! # Design Decisions
//! - Routes are fixed at compile time; each names its upstream path and
//!   delivery mode
//! - Both agent routes share one breaker because they reach the same upstream

use crate::proxy::ProxyMode;

/// A gateway path forwarded to the downstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyRoute {
    /// Path served by the gateway.
    pub path: &'static str,
    /// Path on the resolved downstream instance.
    pub upstream_path: &'static str,
    pub mode: ProxyMode,
}

pub const AGENT: ProxyRoute = ProxyRoute {
    path: "/agent",
    upstream_path: "/recommendations",
    mode: ProxyMode::Buffered,
};

pub const AGENT_STREAM: ProxyRoute = ProxyRoute {
    path: "/agent/stream",
    upstream_path: "/recommendations/stream",
    mode: ProxyMode::Streaming,
};

pub const PROXY_ROUTES: [ProxyRoute; 2] = [AGENT, AGENT_STREAM];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_modes() {
        assert_eq!(AGENT.mode, ProxyMode::Buffered);
        assert_eq!(AGENT_STREAM.mode, ProxyMode::Streaming);
        assert!(PROXY_ROUTES.iter().all(|r| r.upstream_path.starts_with("/recommendations")));
    }
}
