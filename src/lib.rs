// =============================================================================
// STOREFRONT SERVICE
// =============================================================================
// Order service for a small seasonal food storefront:
//
// - serves the product catalog
// - validates and prices order submissions, with cash or card payment
// - creates card payment intents and verifies payment webhooks
// - appends orders to a Google Sheets "Orders" tab
// - lets the business read orders back through bearer-protected endpoints
//
// The binary (main.rs) wires configuration, logging and metrics around
// `build_router`; everything else lives in this library so it can be tested
// in-process.
// =============================================================================

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dead_letter;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod payment;
pub mod pipeline;
pub mod store;
pub mod validation;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use chrono_tz::Tz;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::dead_letter::DeadLetterLog;
use crate::payment::{PaymentGateway, StripeGateway};
use crate::pipeline::OrderPipeline;
use crate::store::sheets::SheetsStore;
use crate::store::OrderStore;

// -----------------------------------------------------------------------------
// APPLICATION STATE
// -----------------------------------------------------------------------------
// Shared read-only by every handler through `State<Arc<AppState>>`. Nothing
// in here is mutated after startup.
pub struct AppState {
    pub catalog: Catalog,
    pub pipeline: OrderPipeline,

    /// `None` when STRIPE_SECRET_KEY is unset
    pub gateway: Option<Arc<dyn PaymentGateway>>,

    /// `None` in demo mode
    pub store: Option<Arc<dyn OrderStore>>,

    pub webhook_secret: Option<String>,
    pub admin_api_key: String,
    pub currency: String,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Wire collaborators from configuration. Fails only on credentials that
    /// are present but unusable (an unreadable private key).
    pub fn from_config(config: &Config, metrics_handle: PrometheusHandle) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("storefront-service/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let catalog = Catalog::default();
        let tz: Tz = config.business_timezone;

        let gateway: Option<Arc<dyn PaymentGateway>> = config.stripe_secret_key.as_ref().map(|key| {
            Arc::new(StripeGateway::new(http.clone(), &config.stripe_api_base, key)) as Arc<dyn PaymentGateway>
        });

        let store: Option<Arc<dyn OrderStore>> = match &config.sheets {
            Some(credentials) => Some(Arc::new(SheetsStore::new(
                http.clone(),
                credentials,
                &config.sheets_api_base,
                &config.google_token_uri,
            )?) as Arc<dyn OrderStore>),
            None => None,
        };

        let pipeline = OrderPipeline::new(
            catalog,
            store.clone(),
            gateway.clone(),
            DeadLetterLog::new(config.dead_letter_path.clone()),
            tz,
        );

        Ok(Self {
            catalog,
            pipeline,
            gateway,
            store,
            webhook_secret: config.stripe_webhook_secret.clone(),
            admin_api_key: config.admin_api_key.clone(),
            currency: config.payment_currency.clone(),
            metrics_handle,
        })
    }
}

// -----------------------------------------------------------------------------
// ROUTES
// -----------------------------------------------------------------------------
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ----- Health, readiness, metrics -----
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        // ----- Storefront -----
        .route("/api/products", get(handlers::list_products))
        .route("/api/submit-order", post(handlers::submit_order))
        .route("/api/create-payment-intent", post(handlers::create_payment_intent))
        .route("/api/stripe-webhook", post(handlers::stripe_webhook))
        // ----- Admin (bearer token) -----
        .route("/api/get-orders", get(handlers::get_orders))
        .route("/api/get-orders/stats", get(handlers::get_order_stats))
        .route("/api/get-orders/:order_id", get(handlers::get_order_detail))
        // The storefront page is served from another origin
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(vars: &[(&str, &str)]) -> Config {
        let vars: Vec<(String, String)> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())).unwrap()
    }

    #[test]
    fn test_state_without_credentials_is_demo() {
        let state = AppState::from_config(&test_config(&[]), crate::metrics::detached_handle().unwrap()).unwrap();
        assert!(state.pipeline.is_demo());
        assert!(state.gateway.is_none());
        assert!(state.store.is_none());
    }

    #[test]
    fn test_state_with_stripe_key_has_gateway() {
        let config = test_config(&[("STRIPE_SECRET_KEY", "sk_test_123")]);
        let state = AppState::from_config(&config, crate::metrics::detached_handle().unwrap()).unwrap();
        assert!(state.gateway.is_some());
    }

    #[test]
    fn test_unreadable_private_key_fails_startup() {
        let config = test_config(&[
            ("GOOGLE_SHEETS_CLIENT_EMAIL", "svc@example.iam.gserviceaccount.com"),
            ("GOOGLE_SHEETS_PRIVATE_KEY", "not-a-pem"),
            ("GOOGLE_SHEETS_SPREADSHEET_ID", "abc"),
        ]);
        assert!(AppState::from_config(&config, crate::metrics::detached_handle().unwrap()).is_err());
    }
}
