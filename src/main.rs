//! API Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     API GATEWAY                      │
//!                      │                                                      │
//!   Client Request     │  ┌──────────┐   ┌────────────┐   ┌──────────────┐    │
//!   ───────────────────┼─▶│ http     │──▶│ security   │──▶│ routing      │    │
//!                      │  │ server   │   │ rate limit │   │ resolver     │────┼──▶ Registry
//!                      │  └──────────┘   └────────────┘   └──────┬───────┘    │
//!                      │                                          ▼            │
//!   Client Response    │  ┌──────────────────────┐   ┌──────────────────┐     │
//!   ◀──────────────────┼──│ proxy                │◀──│ resilience       │     │
//!                      │  │ buffered / streaming │   │ circuit breaker  │     │
//!                      │  └──────────┬───────────┘   └──────────────────┘     │
//!                      │             └────────────────────────────────────────┼──▶ Agent service
//!                      │                                                      │
//!                      │  registry lease keeper · admin · observability       │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use api_gateway::config;
use api_gateway::lifecycle::startup;
use api_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "api-gateway", version, about = "API gateway with service discovery")]
struct Args {
    /// Optional TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, ignored) = config::load(args.config.as_deref())?;
    logging::init_logging(&config.observability);
    for o in &ignored {
        tracing::warn!(key = o.key, value = %o.value, "Ignoring invalid environment override");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.port,
        registry = %config.registry.base_url,
        downstream = %config.downstream.app_name,
        "api-gateway starting"
    );

    startup::run(config).await?;
    Ok(())
}
