// =============================================================================
// PAYMENT MODULE
// =============================================================================
// Card payments through Stripe.
//
// - `PaymentGateway` is the seam: the HTTP implementation talks to the Stripe
//   REST API, tests use the mockall-generated `MockPaymentGateway`.
// - `create_order_intent` prices the cart from the catalog before asking the
//   gateway for an intent; a client-sent amount is never used.
// - `verify_webhook_signature` fails closed: anything but a valid, fresh,
//   well-formed signed event is rejected.
//
// The webhook path only observes payments. It does not update the order
// sheet, so a record written as `pending` stays `pending` even if the
// gateway later reports success.
// =============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::catalog::{round_money, Catalog, CatalogError, Selection};

/// Signed webhook timestamps older than this are refused.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

// =============================================================================
// TYPES
// =============================================================================

/// The gateway's view of a payment intent. Only the fields this service
/// reads are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,

    #[serde(default)]
    pub client_secret: Option<String>,

    /// Minor units (cents)
    #[serde(default)]
    pub amount: i64,

    #[serde(default)]
    pub currency: String,

    /// `requires_payment_method`, `succeeded`, `canceled`, ...
    pub status: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(default)]
    pub receipt_email: Option<String>,

    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub message: Option<String>,
}

/// Everything needed to open an intent.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentRequest {
    /// Major units; converted to cents on the way out
    pub amount: Decimal,
    pub currency: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub order_id: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Payment processing is not configured")]
    NotConfigured,

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// The gateway answered with an error; carries its human-readable reason.
    #[error("{0}")]
    Gateway(String),

    #[error("Payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),
}

impl From<CatalogError> for PaymentError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProductNotFound(id) => PaymentError::ProductNotFound(id),
        }
    }
}

// =============================================================================
// GATEWAY TRAIT
// =============================================================================

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;
}

/// Round to the cent and express in minor units.
pub fn to_minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    (round_money(amount) * Decimal::ONE_HUNDRED)
        .to_i64()
        .filter(|cents| *cents >= 0)
        .ok_or(PaymentError::InvalidAmount(amount))
}

// =============================================================================
// STRIPE HTTP IMPLEMENTATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct StripeGateway {
    http: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(http: Client, api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    /// Form fields for `POST /v1/payment_intents`.
    fn intent_form(request: &IntentRequest) -> Result<Vec<(String, String)>, PaymentError> {
        let mut form = vec![
            ("amount".to_string(), to_minor_units(request.amount)?.to_string()),
            ("currency".to_string(), request.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
            ("description".to_string(), format!("Order - {}", request.order_id)),
            ("metadata[orderId]".to_string(), request.order_id.clone()),
            (
                "metadata[customerName]".to_string(),
                request.customer_name.clone().unwrap_or_default(),
            ),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }
        if let Some(email) = request.customer_email.as_deref().map(str::trim) {
            if !email.is_empty() {
                form.push(("receipt_email".to_string(), email.to_string()));
            }
        }
        Ok(form)
    }

    async fn read_intent(response: reqwest::Response) -> Result<PaymentIntent, PaymentError> {
        if response.status().is_success() {
            return Ok(response.json::<PaymentIntent>().await?);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<StripeErrorBody>(&text)
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| format!("payment gateway returned {status}"));
        Err(PaymentError::Gateway(reason))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let form = Self::intent_form(request)?;
        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let intent = Self::read_intent(response).await;
        if let Err(e) = &intent {
            tracing::error!(order_id = %request.order_id, error = %e, "Error creating payment intent");
        }
        intent
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .http
            .get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Self::read_intent(response).await
    }
}

// =============================================================================
// INTENT QUOTES
// =============================================================================

/// Customer details that travel with a new intent.
#[derive(Debug, Clone, Default)]
pub struct IntentCustomer {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// One priced line echoed back to the checkout page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLine {
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntentQuote {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub order_id: String,
    pub total: Decimal,
    pub products: Vec<QuoteLine>,
}

/// Price `selections` from the catalog and open an intent for the total.
pub async fn create_order_intent(
    gateway: &dyn PaymentGateway,
    catalog: &Catalog,
    selections: &[Selection],
    customer: IntentCustomer,
    currency: &str,
    order_id: String,
) -> Result<IntentQuote, PaymentError> {
    let priced = catalog.price(selections)?;

    let mut metadata = BTreeMap::new();
    metadata.insert("productCount".to_string(), priced.lines.len().to_string());
    metadata.insert("totalQuantity".to_string(), priced.total_quantity().to_string());
    metadata.insert("customerPhone".to_string(), customer.phone.unwrap_or_default());

    let request = IntentRequest {
        amount: priced.total,
        currency: currency.to_string(),
        customer_email: customer.email,
        customer_name: customer.name,
        order_id: order_id.clone(),
        metadata,
    };
    let intent = gateway.create_intent(&request).await?;

    tracing::info!(
        order_id = %order_id,
        payment_intent_id = %intent.id,
        total = %priced.total,
        "Payment intent created"
    );

    Ok(IntentQuote {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        order_id,
        total: priced.total,
        products: priced
            .lines
            .iter()
            .map(|l| QuoteLine {
                name: l.product.name.to_string(),
                quantity: l.quantity,
                price: l.product.price(),
                line_total: l.line_total,
            })
            .collect(),
    })
}

// =============================================================================
// WEBHOOKS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

/// What the service did with a verified event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    PaymentSucceeded { intent_id: String },
    PaymentFailed { intent_id: String },
    Ignored { kind: String },
}

impl EventDisposition {
    pub fn label(&self) -> &'static str {
        match self {
            EventDisposition::PaymentSucceeded { .. } => "payment_succeeded",
            EventDisposition::PaymentFailed { .. } => "payment_failed",
            EventDisposition::Ignored { .. } => "ignored",
        }
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`)
/// against `payload` and parse the event.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<WebhookEvent, PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::SignatureInvalid)?;
    if signatures.is_empty() || (now_unix - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(PaymentError::SignatureInvalid);
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });
    if !matched {
        return Err(PaymentError::SignatureInvalid);
    }

    serde_json::from_slice(payload).map_err(|e| PaymentError::MalformedEvent(e.to_string()))
}

/// Log the outcome of a verified event. Nothing is written back to the
/// order sheet.
pub fn handle_event(event: &WebhookEvent) -> EventDisposition {
    let object = &event.data.object;
    let intent_id = object
        .get("id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    let order_id = object
        .pointer("/metadata/orderId")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    let amount = object
        .get("amount")
        .and_then(serde_json::Value::as_i64)
        .map(|cents| Decimal::new(cents, 2))
        .unwrap_or_default();

    match event.kind.as_str() {
        "payment_intent.succeeded" => {
            tracing::info!(
                event_id = %event.id,
                payment_intent_id = %intent_id,
                order_id = %order_id,
                amount = %format!("${amount:.2}"),
                customer_name = object.pointer("/metadata/customerName").and_then(|v| v.as_str()).unwrap_or_default(),
                "Payment succeeded"
            );
            EventDisposition::PaymentSucceeded { intent_id }
        }
        "payment_intent.payment_failed" => {
            let reason = object
                .pointer("/last_payment_error/message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("Unknown error");
            tracing::warn!(
                event_id = %event.id,
                payment_intent_id = %intent_id,
                order_id = %order_id,
                error = %reason,
                "Payment failed"
            );
            EventDisposition::PaymentFailed { intent_id }
        }
        other => {
            tracing::info!(event_type = %other, "Unhandled webhook event type");
            EventDisposition::Ignored {
                kind: other.to_string(),
            }
        }
    }
}
