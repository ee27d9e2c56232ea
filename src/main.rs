// src/main.rs
use dotenv::dotenv;
use reqwest::Client;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use session_edge::build_router;
use session_edge::common::{AppState, GatewayConfig};

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = GatewayConfig::from_env();
    info!(
        backend_url = %config.backend_url,
        cors_origins = ?config.cors_origins,
        access_max_age_secs = config.cookies.access_max_age_secs,
        refresh_max_age_secs = config.cookies.refresh_max_age_secs,
        identity_cache_ttl_secs = config.identity_cache_ttl_secs,
        "Loaded edge configuration"
    );
    if !config.cookies.secure {
        warn!("COOKIE_SECURE=false: session cookies will be sent over plain http");
    }

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder().no_proxy().build()?;
    let port = config.port;
    let app_state = AppState::new(config, http_client);
    let app = build_router(app_state);

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
