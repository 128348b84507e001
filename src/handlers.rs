// =============================================================================
// HANDLERS MODULE
// =============================================================================
// HTTP request handlers. Each handler is thin: extract, call into the
// component that owns the behaviour, shape the response, record metrics.
//
// JSON bodies are taken as `Result<Json<_>, JsonRejection>` so malformed
// input answers 400 through `AppError` rather than axum's default 422.
// =============================================================================

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::admin::{self, OrderQuery, OrderView};
use crate::catalog::Category;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::*;
use crate::payment::{self, IntentCustomer, PaymentError};
use crate::store::{record, OrderStore};
use crate::validation::{validate_selections, ValidationErrors};
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Record the request counter and latency for a finished handler.
fn observe<T>(method: &str, endpoint: &str, start: Instant, result: &AppResult<T>) {
    let status = match result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    };
    metrics::record_http_request(method, endpoint, status, start.elapsed().as_secs_f64());
}

// =============================================================================
// HEALTH CHECK ENDPOINTS
// =============================================================================

/// Liveness probe
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "storefront-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe. Always 200: an unconfigured order store is demo mode,
/// which is a deliberate deployment, not an outage.
///
/// GET /ready
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    let demo_mode = state.pipeline.is_demo();
    Json(ReadinessResponse {
        status: if demo_mode { "demo" } else { "ready" }.to_string(),
        checks: ReadinessChecks {
            order_store: state.store.is_some(),
            payment_gateway: state.gateway.is_some(),
            webhook_secret: state.webhook_secret.is_some(),
            demo_mode,
        },
    })
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

// =============================================================================
// CATALOG
// =============================================================================

/// GET /api/products
pub async fn list_products(State(state): State<Arc<AppState>>) -> Json<ProductsResponse> {
    let categories: Vec<CategoryGroup> = Category::ALL
        .iter()
        .map(|&category| CategoryGroup {
            category,
            products: state.catalog.by_category(category).map(ProductView::from).collect(),
        })
        .collect();

    Json(ProductsResponse {
        total: state.catalog.products().len(),
        categories,
    })
}

// =============================================================================
// ORDER SUBMISSION
// =============================================================================

/// POST /api/submit-order
///
/// # Response
/// 200 `{success, message, orderId, total, paymentStatus?, paymentIntentId?, warning?}`,
/// 400 `{error, details?}` for bad input, 500 when the order could not be saved.
pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<SubmitOrderResponse>> {
    let start = Instant::now();

    let result: AppResult<_> = async {
        let Json(payload) = body?;
        let receipt = state.pipeline.submit(&payload).await?;
        Ok(Json(SubmitOrderResponse::from(receipt)))
    }
    .await;

    observe("POST", "/api/submit-order", start, &result);
    result
}

// =============================================================================
// PAYMENTS
// =============================================================================

/// POST /api/create-payment-intent
///
/// The total is priced from the catalog; any amount the client sends is
/// ignored.
pub async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreatePaymentIntentRequest>, JsonRejection>,
) -> AppResult<Json<CreatePaymentIntentResponse>> {
    let start = Instant::now();

    let result: AppResult<_> = async {
        let Json(request) = body?;
        let gateway = state.gateway.as_deref().ok_or(PaymentError::NotConfigured)?;

        let mut errors = Vec::new();
        let selections = validate_selections(request.selected_products.as_ref(), &mut errors);
        if !errors.is_empty() {
            return Err(AppError::Validation(ValidationErrors(errors)));
        }

        let customer = IntentCustomer {
            email: request.customer_email,
            name: request.customer_name,
            phone: request.customer_phone,
        };
        let quote = payment::create_order_intent(
            gateway,
            &state.catalog,
            &selections,
            customer,
            &state.currency,
            record::order_id(Utc::now()),
        )
        .await;
        metrics::record_payment_intent(quote.is_ok());

        Ok(Json(CreatePaymentIntentResponse::from(quote?)))
    }
    .await;

    observe("POST", "/api/create-payment-intent", start, &result);
    result
}

/// POST /api/stripe-webhook
///
/// The raw body is needed for signature verification, so it is taken as
/// bytes. Verified events are logged; the order sheet is not touched.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let start = Instant::now();

    let result = verify_and_handle(&state, &headers, &body);

    observe("POST", "/api/stripe-webhook", start, &result);
    result
}

fn verify_and_handle(state: &AppState, headers: &HeaderMap, body: &[u8]) -> AppResult<Json<WebhookAck>> {
    let secret = state
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Webhook secret not configured".to_string()))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing stripe-signature header".to_string()))?;

    let event = payment::verify_webhook_signature(body, signature, secret, Utc::now().timestamp())
        .inspect_err(|e| {
            tracing::warn!(error = %e, "Webhook rejected");
            metrics::record_webhook_event("rejected");
        })?;

    let disposition = payment::handle_event(&event);
    metrics::record_webhook_event(disposition.label());
    Ok(Json(WebhookAck { received: true }))
}

// =============================================================================
// ADMIN ENDPOINTS
// =============================================================================
// All three re-read the whole sheet. The bearer check runs before the store
// is touched.

async fn authorized_orders(state: &AppState, headers: &HeaderMap) -> AppResult<Vec<OrderView>> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !admin::is_authorized(header, &state.admin_api_key) {
        tracing::warn!("Admin request with missing or wrong bearer token");
        return Err(AppError::Unauthorized);
    }

    let store: &dyn OrderStore = state.store.as_deref().ok_or(AppError::StoreNotConfigured)?;
    let orders = store.list_orders().await?;
    Ok(orders.into_iter().map(OrderView::from).collect())
}

/// GET /api/get-orders?search=&status=
pub async fn get_orders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<OrderQuery>,
) -> AppResult<Json<OrdersListResponse>> {
    let start = Instant::now();

    let result: AppResult<_> = async {
        let orders = admin::filter_orders(authorized_orders(&state, &headers).await?, &query);
        Ok(Json(OrdersListResponse {
            success: true,
            total: orders.len(),
            orders,
        }))
    }
    .await;

    observe("GET", "/api/get-orders", start, &result);
    result
}

/// GET /api/get-orders/:order_id
pub async fn get_order_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_id): Path<String>,
) -> AppResult<Json<OrderDetailResponse>> {
    let start = Instant::now();

    let result: AppResult<_> = async {
        let orders = authorized_orders(&state, &headers).await?;
        let detail = admin::order_detail(orders, &order_id)
            .ok_or_else(|| AppError::NotFound(format!("Order not found: {order_id}")))?;
        Ok(Json(OrderDetailResponse::from(detail)))
    }
    .await;

    observe("GET", "/api/get-orders/:order_id", start, &result);
    result
}

/// GET /api/get-orders/stats
pub async fn get_order_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<OrderStatsResponse>> {
    let start = Instant::now();

    let result: AppResult<_> = async {
        let orders = authorized_orders(&state, &headers).await?;
        Ok(Json(OrderStatsResponse {
            success: true,
            stats: admin::order_stats(&orders),
        }))
    }
    .await;

    observe("GET", "/api/get-orders/stats", start, &result);
    result
}

// =============================================================================
// TESTS
// =============================================================================
// Handlers are driven through the full router with `oneshot`; collaborators
// are mockall mocks.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::dead_letter::DeadLetterLog;
    use crate::payment::{MockPaymentGateway, PaymentGateway, PaymentIntent};
    use crate::pipeline::OrderPipeline;
    use crate::store::{MockOrderStore, OrderRecord, RecordHandle, StoreError, StoredOrder};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    const ADMIN_KEY: &str = "test-admin-key";
    const WEBHOOK_SECRET: &str = "whsec_test";

    fn app(store: Option<MockOrderStore>, gateway: Option<MockPaymentGateway>) -> Router {
        let store = store.map(|s| Arc::new(s) as Arc<dyn OrderStore>);
        let gateway = gateway.map(|g| Arc::new(g) as Arc<dyn PaymentGateway>);
        let tz = chrono_tz::America::New_York;
        let state = AppState {
            catalog: Catalog::default(),
            pipeline: OrderPipeline::new(
                Catalog::default(),
                store.clone(),
                gateway.clone(),
                DeadLetterLog::disabled(),
                tz,
            ),
            gateway,
            store,
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            admin_api_key: ADMIN_KEY.to_string(),
            currency: "usd".to_string(),
            metrics_handle: crate::metrics::detached_handle().unwrap(),
        };
        crate::build_router(Arc::new(state))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn admin_get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn order_payload() -> Value {
        let pickup = Utc::now()
            .with_timezone(&chrono_tz::America::New_York)
            .date_naive()
            + chrono::Duration::days(3);
        json!({
            "name": "Priya Raman",
            "phone": "(555) 123-4567",
            "paymentMethod": "cash",
            "pickupDate": pickup.format("%Y-%m-%d").to_string(),
            "selectedProducts": [{"productId": "athirasam", "quantity": 2}],
        })
    }

    fn stored(row: usize, order_id: &str, status: &str) -> StoredOrder {
        let mut cells = vec![String::new(); crate::store::record::COLUMN_COUNT];
        cells[1] = "Meena".to_string();
        cells[4] = "1. Athirasam (10 pcs) - Qty: 2 = $28.00".to_string();
        cells[5] = "$28.00".to_string();
        cells[7] = status.to_string();
        cells[12] = order_id.to_string();
        StoredOrder {
            row,
            record: OrderRecord::from_row(&cells),
        }
    }

    fn listing_store() -> MockOrderStore {
        let mut store = MockOrderStore::new();
        store
            .expect_list_orders()
            .returning(|| Ok(vec![stored(2, "ORDER_2", "completed"), stored(1, "ORDER_1", "pending")]));
        store
    }

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    // ----- health -----

    #[tokio::test]
    async fn test_health_and_readiness() {
        let (status, body) = send(app(None, None), admin_get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "storefront-service");

        let (status, body) = send(app(None, None), admin_get("/ready", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["demoMode"], true);
    }

    #[tokio::test]
    async fn test_products_are_grouped() {
        let (status, body) = send(app(None, None), admin_get("/api/products", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 17);
        assert_eq!(body["categories"][0]["category"], "sweets");
        assert_eq!(body["categories"][2]["products"].as_array().unwrap().len(), 3);
    }

    // ----- submit-order -----

    #[tokio::test]
    async fn test_submit_order_confirmed() {
        let mut store = MockOrderStore::new();
        store.expect_append_order().times(1).returning(|r| {
            Ok(RecordHandle {
                order_id: r.order_id.clone(),
                updated_range: None,
            })
        });

        let (status, body) = send(app(Some(store), None), post_json("/api/submit-order", order_payload())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["total"], 28.0);
        assert_eq!(body["paymentStatus"], "pending");
        assert!(body["orderId"].as_str().unwrap().starts_with("ORDER_"));
    }

    #[tokio::test]
    async fn test_submit_order_degraded_still_succeeds() {
        let mut store = MockOrderStore::new();
        store
            .expect_append_order()
            .returning(|_| Err(StoreError::PermissionDenied));

        let (status, body) = send(app(Some(store), None), post_json("/api/submit-order", order_payload())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(!body["warning"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_order_store_failure_is_500() {
        let mut store = MockOrderStore::new();
        store
            .expect_append_order()
            .returning(|_| Err(StoreError::AppendFailed("boom".to_string())));

        let (status, body) = send(app(Some(store), None), post_json("/api/submit-order", order_payload())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_submit_order_demo_mode() {
        let (status, body) = send(app(None, None), post_json("/api/submit-order", order_payload())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("demo mode"));
        assert!(body["orderId"].as_str().unwrap().starts_with("DEMO_ORDER_"));
    }

    #[tokio::test]
    async fn test_submit_order_validation_details() {
        let mut payload = order_payload();
        payload["phone"] = json!("555-123-4567");

        let (status, body) = send(app(None, None), post_json("/api/submit-order", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid order data");
        assert_eq!(body["details"][0]["field"], "phone");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let request = Request::post("/api/submit-order")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app(None, None), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    // ----- create-payment-intent -----

    #[tokio::test]
    async fn test_payment_intent_priced_from_catalog() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_intent()
            .withf(|req| req.amount == rust_decimal::Decimal::new(4200, 2) && req.currency == "usd")
            .times(1)
            .returning(|req| {
                Ok(PaymentIntent {
                    id: "pi_1".to_string(),
                    client_secret: Some("pi_1_secret".to_string()),
                    amount: 4200,
                    currency: "usd".to_string(),
                    status: "requires_payment_method".to_string(),
                    metadata: BTreeMap::from([("orderId".to_string(), req.order_id.clone())]),
                    receipt_email: None,
                    last_payment_error: None,
                })
            });

        let body = json!({
            "selectedProducts": [{"productId": "badusha", "quantity": 3}],
            "customerName": "Priya",
            "amount": 1,
        });
        let (status, body) = send(app(None, Some(gateway)), post_json("/api/create-payment-intent", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["clientSecret"], "pi_1_secret");
        assert_eq!(body["total"], 42.0);
        assert_eq!(body["products"][0]["lineTotal"], 42.0);
    }

    #[tokio::test]
    async fn test_payment_intent_unknown_product_is_400() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_intent().never();

        let body = json!({"selectedProducts": [{"productId": "ghost", "quantity": 1}]});
        let (status, body) = send(app(None, Some(gateway)), post_json("/api/create-payment-intent", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Product not found: ghost");
    }

    #[tokio::test]
    async fn test_payment_intent_requires_products() {
        let (status, _) = send(
            app(None, Some(MockPaymentGateway::new())),
            post_json("/api/create-payment-intent", json!({"selectedProducts": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ----- webhook -----

    fn webhook_request(payload: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::post("/api/stripe-webhook");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(payload.to_string())).unwrap()
    }

    fn event_payload() -> String {
        json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_1", "amount": 2800, "metadata": {"orderId": "ORDER_1"}}}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_webhook_accepts_valid_signature() {
        let payload = event_payload();
        let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
        let (status, body) = send(app(None, None), webhook_request(&payload, Some(signature))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"received": true}));
    }

    #[tokio::test]
    async fn test_webhook_rejects_tampered_payload() {
        let payload = event_payload();
        let signature = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
        let tampered = payload.replace("2800", "1");
        let (status, body) = send(app(None, None), webhook_request(&tampered, Some(signature))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("received").is_none());
    }

    #[tokio::test]
    async fn test_webhook_requires_signature_header() {
        let (status, _) = send(app(None, None), webhook_request(&event_payload(), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ----- admin -----

    #[tokio::test]
    async fn test_admin_requires_bearer() {
        let mut store = MockOrderStore::new();
        store.expect_list_orders().never();

        let (status, body) = send(app(Some(store), None), admin_get("/api/get-orders", Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Unauthorized"}));
    }

    #[tokio::test]
    async fn test_admin_listing() {
        let (status, body) = send(
            app(Some(listing_store()), None),
            admin_get("/api/get-orders?status=pending", Some(ADMIN_KEY)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["total"], 1);
        assert_eq!(body["orders"][0]["orderId"], "ORDER_1");
        assert_eq!(body["orders"][0]["id"], 1);
    }

    #[tokio::test]
    async fn test_admin_detail_and_stats() {
        let (status, body) = send(
            app(Some(listing_store()), None),
            admin_get("/api/get-orders/ORDER_2", Some(ADMIN_KEY)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lines"][0]["kind"], "parsed");
        assert_eq!(body["lines"][0]["packSize"], "10 pcs");

        let (status, body) = send(
            app(Some(listing_store()), None),
            admin_get("/api/get-orders/stats", Some(ADMIN_KEY)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalOrders"], 2);
        assert_eq!(body["totalRevenue"], 28.0);

        let (status, _) = send(
            app(Some(listing_store()), None),
            admin_get("/api/get-orders/ORDER_9", Some(ADMIN_KEY)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_without_store_is_500() {
        let (status, _) = send(app(None, None), admin_get("/api/get-orders", Some(ADMIN_KEY))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
