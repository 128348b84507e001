// =============================================================================
// MODELS MODULE
// =============================================================================
// Request and response bodies of the HTTP API.
//
// Domain types live with their components (catalog, validation, store,
// payment); the structs here are the JSON shapes the storefront page and the
// admin dashboard consume. Field names are camelCase on the wire.
// =============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::admin::{OrderDetail, OrderStats, OrderView};
use crate::catalog::{Category, Product};
use crate::payment::{IntentQuote, QuoteLine};
use crate::pipeline::Receipt;
use crate::store::summary::SummaryLine;

// =============================================================================
// CATALOG
// =============================================================================

/// One product as the storefront renders it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub pack_size: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl From<&'static Product> for ProductView {
    fn from(p: &'static Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            category: p.category,
            pack_size: p.pack_size,
            price: p.price(),
            image: p.image,
            description: p.description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup {
    pub category: Category,
    pub products: Vec<ProductView>,
}

/// GET /api/products
#[derive(Debug, Clone, Serialize)]
pub struct ProductsResponse {
    pub categories: Vec<CategoryGroup>,
    pub total: usize,
}

// =============================================================================
// ORDER SUBMISSION
// =============================================================================

// -----------------------------------------------------------------------------
// SUBMIT ORDER RESPONSE
// -----------------------------------------------------------------------------
/// Body of a 200 from POST /api/submit-order
///
/// # Example JSON
/// ```json
/// {
///   "success": true,
///   "message": "Order submitted successfully",
///   "orderId": "ORDER_1792000000123",
///   "total": 47.0,
///   "paymentStatus": "pending"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderResponse {
    pub success: bool,
    pub message: String,
    pub order_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Present when the order was accepted but not written to the sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<Receipt> for SubmitOrderResponse {
    fn from(r: Receipt) -> Self {
        Self {
            success: true,
            message: r.message,
            order_id: r.order_id,
            total: r.total,
            payment_status: r.payment_status.map(|s| s.to_string()),
            payment_intent_id: r.payment_intent_id,
            warning: r.warning,
        }
    }
}

// =============================================================================
// PAYMENTS
// =============================================================================

/// POST /api/create-payment-intent
///
/// `selectedProducts` is kept raw and checked with the same rules as an
/// order submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    #[serde(default)]
    pub selected_products: Option<Value>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub order_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub products: Vec<QuoteLine>,
}

impl From<IntentQuote> for CreatePaymentIntentResponse {
    fn from(q: IntentQuote) -> Self {
        Self {
            client_secret: q.client_secret,
            payment_intent_id: q.payment_intent_id,
            order_id: q.order_id,
            total: q.total,
            products: q.products,
        }
    }
}

/// Acknowledgement for any verified webhook event, handled or not.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

// =============================================================================
// ADMIN
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OrdersListResponse {
    pub success: bool,
    pub orders: Vec<OrderView>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetailResponse {
    pub success: bool,
    pub order: OrderView,
    pub lines: Vec<SummaryLine>,
}

impl From<OrderDetail> for OrderDetailResponse {
    fn from(d: OrderDetail) -> Self {
        Self {
            success: true,
            order: d.order,
            lines: d.lines,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: OrderStats,
}

// =============================================================================
// HEALTH CHECK RESPONSES
// =============================================================================

/// Simple health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Readiness plus which collaborators are wired up
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessChecks {
    pub order_store: bool,
    pub payment_gateway: bool,
    pub webhook_secret: bool,
    pub demo_mode: bool,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// Body of every non-2xx answer: `{error, details?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,

    /// Field-level validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: Value) -> Self {
        Self {
            error: error.into(),
            details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::pipeline::Outcome;
    use crate::store::PaymentStatus;

    #[test]
    fn test_product_view_uses_decimal_price() {
        let product = Catalog::default().get("diwali-kadambam").unwrap();
        let json = serde_json::to_value(ProductView::from(product)).unwrap();
        assert_eq!(json["price"], 29.99);
        assert_eq!(json["category"], "giftbox");
        assert_eq!(json["packSize"], product.pack_size);
    }

    #[test]
    fn test_submit_response_omits_absent_fields() {
        let receipt = Receipt {
            outcome: Outcome::Demo,
            message: "Order submitted successfully (demo mode)".to_string(),
            order_id: "DEMO_ORDER_1".to_string(),
            total: Decimal::new(2800, 2),
            payment_status: None,
            payment_intent_id: None,
            warning: None,
        };
        let json = serde_json::to_value(SubmitOrderResponse::from(receipt)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["orderId"], "DEMO_ORDER_1");
        assert_eq!(json["total"], 28.0);
        assert!(json.get("paymentStatus").is_none());
        assert!(json.get("warning").is_none());
    }

    #[test]
    fn test_submit_response_carries_warning() {
        let receipt = Receipt {
            outcome: Outcome::Degraded,
            message: "m".to_string(),
            order_id: "ORDER_1".to_string(),
            total: Decimal::ONE,
            payment_status: Some(PaymentStatus::Pending),
            payment_intent_id: None,
            warning: Some("manual".to_string()),
        };
        let json = serde_json::to_value(SubmitOrderResponse::from(receipt)).unwrap();
        assert_eq!(json["paymentStatus"], "pending");
        assert_eq!(json["warning"], "manual");
    }

    #[test]
    fn test_error_response_details_are_optional() {
        let plain = serde_json::to_value(ErrorResponse::new("Unauthorized")).unwrap();
        assert_eq!(plain, serde_json::json!({"error": "Unauthorized"}));
    }
}
