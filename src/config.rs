// =============================================================================
// CONFIGURATION MODULE
// =============================================================================
// Settings come from environment variables (a .env file is loaded first by
// main). Only PORT and BUSINESS_TIMEZONE are parsed; everything else is a
// string or an optional string.
//
// Optional collaborators:
// - Stripe secret key absent      -> no card gateway
// - webhook secret absent         -> webhook endpoint answers 400
// - any Google Sheets var absent  -> demo mode, orders are not persisted
// =============================================================================

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono_tz::Tz;

use crate::store::sheets::SheetsCredentials;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ADMIN_API_KEY: &str = "admin123";
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000)
    pub port: u16,

    /// Static bearer token for the admin endpoints
    pub admin_api_key: String,

    /// True when ADMIN_API_KEY was not set and the default is in use
    pub admin_api_key_is_default: bool,

    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,

    /// ISO currency for payment intents, lowercase
    pub payment_currency: String,

    /// `None` means demo mode
    pub sheets: Option<SheetsCredentials>,
    pub sheets_api_base: String,
    pub google_token_uri: String,

    pub dead_letter_path: Option<PathBuf>,

    /// Zone for order timestamps and for deciding what "today" is
    pub business_timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.parse().context("Failed to parse PORT as a number")?,
            None => DEFAULT_PORT,
        };

        let business_timezone = get("BUSINESS_TIMEZONE")
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string())
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("Failed to parse BUSINESS_TIMEZONE as an IANA zone name")?;

        let admin_api_key = get("ADMIN_API_KEY");
        let sheets = match (
            get("GOOGLE_SHEETS_CLIENT_EMAIL"),
            // not trimmed: PEM bodies are whitespace-sensitive
            lookup("GOOGLE_SHEETS_PRIVATE_KEY").filter(|v| !v.trim().is_empty()),
            get("GOOGLE_SHEETS_SPREADSHEET_ID"),
        ) {
            (Some(client_email), Some(private_key), Some(spreadsheet_id)) => Some(SheetsCredentials {
                client_email,
                private_key,
                spreadsheet_id,
            }),
            _ => None,
        };

        Ok(Self {
            port,
            admin_api_key_is_default: admin_api_key.is_none(),
            admin_api_key: admin_api_key.unwrap_or_else(|| DEFAULT_ADMIN_API_KEY.to_string()),
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
            payment_currency: get("PAYMENT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|| "usd".to_string()),
            sheets,
            sheets_api_base: get("GOOGLE_SHEETS_API_BASE")
                .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string()),
            google_token_uri: get("GOOGLE_OAUTH_TOKEN_URI").unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            dead_letter_path: get("DEAD_LETTER_PATH").map(PathBuf::from),
            business_timezone,
        })
    }
}
