//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the evidence profile REST API on its own.
//!
//! ## Intended use
//! Useful for development and debugging. The workspace's main `hawc-run` binary also loads a
//! `.env` file before starting the same router.

use api_rest::{core_config_from_env, router, AppState};
use ep_core::constants::{DEFAULT_REST_ADDR, REST_ADDR_ENV};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the evidence profile REST API server
///
/// # Environment Variables
/// - `HAWC_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `HAWC_LOOKUPS_FILE`: Optional YAML file with lookup tables
/// - `HAWC_DUPLICATE_ORDER_POLICY`: `last-write-wins` (default) or `reject`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the lookups file or policy value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("ep_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var(REST_ADDR_ENV).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let config = core_config_from_env()?;

    tracing::info!("-- Starting evidence profile REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(AppState::new(config))).await?;

    Ok(())
}
