//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, metrics, rate limit, body limit)
//! - Serve on a bound listener until shutdown, then drain

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::GatewayConfig;
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer, track_metrics};
use crate::http::response::not_found;
use crate::http::{docs, handlers};
use crate::proxy::UpstreamClient;
use crate::registry::{LeaseStatus, RegistryClient};
use crate::resilience::BreakerRegistry;
use crate::routing::{TargetResolver, PROXY_ROUTES};
use crate::security::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub resolver: Arc<TargetResolver>,
    pub breakers: Arc<BreakerRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub upstream: UpstreamClient,
    /// Client for best-effort documentation fetches.
    pub docs_client: reqwest::Client,
    /// Present when registration is enabled.
    pub lease: Option<Arc<LeaseStatus>>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        registry: Option<RegistryClient>,
        lease: Option<Arc<LeaseStatus>>,
    ) -> Self {
        let resolver = TargetResolver::from_config(&config, registry);
        let breakers = BreakerRegistry::new(config.circuit_breaker.clone());
        let rate_limiter = RateLimiter::from_config(&config.rate_limit);

        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            breakers: Arc::new(breakers),
            rate_limiter: Arc::new(rate_limiter),
            upstream: UpstreamClient::new(),
            docs_client: reqwest::Client::new(),
            lease,
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// The fully layered router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let mut router = Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/openapi.json", get(docs::openapi))
            .route("/api-docs/aggregate", get(docs::aggregate))
            .route("/api-docs/agent/openapi.json", get(docs::agent_openapi));

        for route in PROXY_ROUTES {
            router = router.route(route.path, handlers::proxy_route(route));
        }

        let mut router = router
            .merge(setup_admin_router())
            .fallback(not_found)
            .layer(middleware::from_fn(track_metrics))
            .layer(RequestBodyLimitLayer::new(state.config.listener.max_body_bytes))
            .layer(DefaultBodyLimit::disable());

        if state.config.rate_limit.enabled {
            router = router.layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            ));
        }

        router
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener until a
    /// shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
