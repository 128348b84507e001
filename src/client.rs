// =============================================================================
// ORDER CLIENT
// =============================================================================
// Checkout-side caller of POST /api/submit-order. Builds the request body
// from a cart plus the checkout form and retries with exponential backoff,
// but only on 5xx answers and transport failures. A 4xx is the customer's to
// fix and comes back immediately.
// =============================================================================

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::cart::Cart;
use crate::catalog::Selection;
use crate::models::{ErrorResponse, SubmitOrderResponse};
use crate::validation::PaymentMethod;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub max_retries: u32,
    /// Doubled after every failed attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// 4xx; never retried
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// 5xx after the last retry
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Could not reach the order service: {0}")]
    Transport(#[from] reqwest::Error),
}

// -----------------------------------------------------------------------------
// REQUEST BODY
// -----------------------------------------------------------------------------

/// What the customer typed into the checkout form.
#[derive(Debug, Clone)]
pub struct CheckoutForm {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub payment_method: PaymentMethod,
    pub pickup_date: NaiveDate,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub payment_method: PaymentMethod,
    pub pickup_date: NaiveDate,
    pub selected_products: Vec<Selection>,
    /// Informational; the server prices the order itself
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
}

impl OrderRequest {
    pub fn new(form: CheckoutForm, cart: &Cart) -> Self {
        Self {
            name: form.name,
            phone: form.phone,
            email: form.email.filter(|e| !e.trim().is_empty()),
            payment_method: form.payment_method,
            pickup_date: form.pickup_date,
            selected_products: cart.selections(),
            total: cart.total(),
            payment_intent_id: form.payment_intent_id,
        }
    }
}

// -----------------------------------------------------------------------------
// CLIENT
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OrderClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OrderClient {
    pub fn new(http: Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }

    #[instrument(name = "submit_order_with_retry", skip(self, request))]
    pub async fn submit_order(&self, request: &OrderRequest) -> Result<SubmitOrderResponse, ClientError> {
        let url = format!("{}/api/submit-order", self.base_url);
        let mut attempt = 0;
        loop {
            let failure = match self.http.post(&url).json(request).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp.json::<SubmitOrderResponse>().await?);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let message = error_message(resp).await;
                    if status.is_client_error() {
                        return Err(ClientError::Rejected {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    ClientError::Server {
                        status: status.as_u16(),
                        message,
                    }
                }
                Err(e) => ClientError::Transport(e),
            };

            if attempt >= self.retry.max_retries {
                return Err(failure);
            }
            let delay = self.retry.delay(attempt);
            tracing::warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %failure, "Order submission failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn error_message(resp: reqwest::Response) -> String {
    let status: StatusCode = resp.status();
    match resp.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => format!("HTTP {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("error")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use axum::{extract::State, http::StatusCode as HttpStatus, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct Script {
        calls: Arc<AtomicUsize>,
        /// Status returned for each call; the last one repeats
        statuses: Arc<Vec<u16>>,
    }

    async fn submit(State(script): State<Script>, Json(body): Json<Value>) -> (HttpStatus, Json<Value>) {
        let n = script.calls.fetch_add(1, Ordering::SeqCst);
        let code = script.statuses[n.min(script.statuses.len() - 1)];
        let status = HttpStatus::from_u16(code).unwrap();
        if status.is_success() {
            return (
                status,
                Json(json!({
                    "success": true,
                    "message": "Order submitted successfully",
                    "orderId": "ORDER_1",
                    "total": body["total"],
                    "paymentStatus": "pending",
                })),
            );
        }
        (status, Json(json!({"error": format!("status {code}")})))
    }

    async fn spawn(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let script = Script {
            calls: calls.clone(),
            statuses: Arc::new(statuses),
        };
        let app = Router::new()
            .route("/api/submit-order", post(submit))
            .with_state(script);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), calls)
    }

    fn client(base: &str) -> OrderClient {
        OrderClient::new(
            Client::new(),
            base,
            RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    fn request() -> OrderRequest {
        let mut cart = Cart::new(Catalog::default());
        cart.select("athirasam", 2).unwrap();
        OrderRequest::new(
            CheckoutForm {
                name: "Priya Raman".to_string(),
                phone: "(555) 123-4567".to_string(),
                email: Some("   ".to_string()),
                payment_method: PaymentMethod::Cash,
                pickup_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                payment_intent_id: None,
            },
            &cart,
        )
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(request()).unwrap();
        assert_eq!(body["paymentMethod"], "cash");
        assert_eq!(body["pickupDate"], "2026-10-20");
        assert_eq!(body["selectedProducts"][0]["productId"], "athirasam");
        assert_eq!(body["total"], 28.0);
        assert!(body.get("email").is_none());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let (base, calls) = spawn(vec![500, 503, 200]).await;
        let response = client(&base).submit_order(&request()).await.unwrap();
        assert!(response.success);
        assert_eq!(response.order_id, "ORDER_1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (base, calls) = spawn(vec![400]).await;
        let err = client(&base).submit_order(&request()).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 400, ref message } if message == "status 400"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (base, calls) = spawn(vec![500]).await;
        let err = client(&base).submit_order(&request()).await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 500, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = client(&format!("http://{addr}")).submit_order(&request()).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
