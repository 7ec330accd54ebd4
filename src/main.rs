use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, core_config_from_env, router};
use ep_core::constants::{DEFAULT_REST_ADDR, REST_ADDR_ENV};

/// Main entry point for the HAWC evidence profile service
///
/// Loads `.env` if present, resolves configuration once and serves the REST API.
///
/// # Environment Variables
/// - `HAWC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HAWC_LOOKUPS_FILE`: Optional YAML file with stream types, judgements and confidence factors
/// - `HAWC_DUPLICATE_ORDER_POLICY`: `last-write-wins` (default) or `reject`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, binding or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hawc_run=info".parse()?)
                .add_directive("ep_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var(REST_ADDR_ENV).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let config = core_config_from_env()?;

    tracing::info!("++ Starting HAWC evidence profiles REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(AppState::new(config))).await?;

    Ok(())
}
