// =============================================================================
// STOREFRONT SERVICE - Main Entry Point
// =============================================================================
// Loads .env and configuration, installs JSON logging and the Prometheus
// recorder, wires collaborators and serves the router.
//
// Missing Google Sheets credentials are not an error: the service starts in
// demo mode and accepts orders without persisting them.
// =============================================================================

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_service::config::Config;
use storefront_service::metrics::setup_metrics;
use storefront_service::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // STEP 1: Environment and logging
    // -------------------------------------------------------------------------
    dotenvy::dotenv().ok();

    // RUST_LOG overrides, e.g. RUST_LOG=info,storefront_service=trace
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Storefront Service...");

    // -------------------------------------------------------------------------
    // STEP 2: Configuration
    // -------------------------------------------------------------------------
    let config = Config::from_env()?;
    info!(
        port = config.port,
        timezone = %config.business_timezone,
        currency = %config.payment_currency,
        "Configuration loaded"
    );

    if config.admin_api_key_is_default {
        warn!("ADMIN_API_KEY not set, admin endpoints use the default key");
    }
    if config.sheets.is_none() {
        warn!("Google Sheets credentials missing - running in demo mode, orders will not be saved");
    }
    if config.stripe_secret_key.is_none() {
        warn!("STRIPE_SECRET_KEY not set - card payments are disabled");
    }
    if config.stripe_webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET not set - payment webhooks will be rejected");
    }

    // -------------------------------------------------------------------------
    // STEP 3: Metrics
    // -------------------------------------------------------------------------
    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    // -------------------------------------------------------------------------
    // STEP 4: Application state and routes
    // -------------------------------------------------------------------------
    let state = Arc::new(AppState::from_config(&config, metrics_handle)?);
    let app = build_router(state);

    // -------------------------------------------------------------------------
    // STEP 5: Serve
    // -------------------------------------------------------------------------
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Storefront Service is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
