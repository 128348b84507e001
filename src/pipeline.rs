// =============================================================================
// ORDER SUBMISSION PIPELINE
// =============================================================================
// One submission, one pass, no shared mutable state:
//
//   received -> validate ---------------------------> rejected (400)
//            -> price from catalog -----------------> rejected (unknown product)
//            -> payment gate (card needs a settled intent) -> rejected
//            -> demo short-circuit (no store configured) --> confirmed (demo)
//            -> append to order sheet
//                 ok ----------------------------------> confirmed
//                 permission denied -------------------> confirmed, degraded
//                 anything else -----------------------> failed (500)
//
// Resubmitting the same order appends a second row with a new id.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::dead_letter::DeadLetterLog;
use crate::metrics;
use crate::payment::{PaymentError, PaymentGateway};
use crate::store::{record, OrderRecord, OrderStore, PaymentStatus, StoreError};
use crate::validation::{validate_order, PaymentMethod, ValidationErrors};

// =============================================================================
// OUTCOMES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Confirmed,
    /// Accepted, but the row could not be written
    Degraded,
    /// No order store configured; nothing persisted
    Demo,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Confirmed => "confirmed",
            Outcome::Degraded => "degraded",
            Outcome::Demo => "demo",
        }
    }
}

/// What the customer is told after a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub outcome: Outcome,
    pub message: String,
    pub order_id: String,
    pub total: Decimal,
    pub payment_status: Option<PaymentStatus>,
    pub payment_intent_id: Option<String>,
    pub warning: Option<String>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Card payment has not been completed")]
    PaymentNotCompleted,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl SubmitError {
    fn outcome_label(&self) -> &'static str {
        match self {
            SubmitError::Persistence(_) => "failed",
            SubmitError::Payment(PaymentError::Transport(_)) => "failed",
            _ => "rejected",
        }
    }
}

impl From<CatalogError> for SubmitError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProductNotFound(id) => SubmitError::ProductNotFound(id),
        }
    }
}

pub const CONFIRMED_MESSAGE: &str = "Order submitted successfully";
pub const DEMO_MESSAGE: &str = "Order submitted successfully (demo mode)";
pub const DEGRADED_MESSAGE: &str = "Order submitted successfully (order sheet unavailable)";
pub const DEGRADED_WARNING: &str =
    "Order recorded for manual processing - order sheet access needs configuration";

// =============================================================================
// PIPELINE
// =============================================================================

pub struct OrderPipeline {
    catalog: Catalog,
    store: Option<Arc<dyn OrderStore>>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    dead_letter: DeadLetterLog,
    tz: Tz,
}

impl OrderPipeline {
    pub fn new(
        catalog: Catalog,
        store: Option<Arc<dyn OrderStore>>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        dead_letter: DeadLetterLog,
        tz: Tz,
    ) -> Self {
        Self {
            catalog,
            store,
            gateway,
            dead_letter,
            tz,
        }
    }

    pub fn is_demo(&self) -> bool {
        self.store.is_none()
    }

    pub async fn submit(&self, payload: &Value) -> Result<Receipt, SubmitError> {
        self.submit_at(payload, Utc::now()).await
    }

    /// Run one submission as of `now`.
    pub async fn submit_at(&self, payload: &Value, now: DateTime<Utc>) -> Result<Receipt, SubmitError> {
        let result = self.run(payload, now).await;
        match &result {
            Ok(receipt) => metrics::record_order_submitted(receipt.outcome.as_str()),
            Err(e) => {
                tracing::warn!(error = %e, "Order submission rejected");
                metrics::record_order_submitted(e.outcome_label());
            }
        }
        result
    }

    async fn run(&self, payload: &Value, now: DateTime<Utc>) -> Result<Receipt, SubmitError> {
        // ----- validate -----
        let today = now.with_timezone(&self.tz).date_naive();
        let submission = validate_order(payload, today, self.tz)?;

        // ----- price -----
        let priced = self.catalog.price(&submission.selected_products)?;
        tracing::debug!(
            lines = priced.lines.len(),
            total = %priced.total,
            payment_method = %submission.payment_method,
            "Order validated and priced"
        );

        // ----- payment gate -----
        let (payment_status, payment_intent_id) = match submission.payment_method {
            PaymentMethod::Cash => (PaymentStatus::Pending, None),
            PaymentMethod::Stripe => {
                let intent_id = submission
                    .payment_intent_id
                    .clone()
                    .ok_or(SubmitError::PaymentNotCompleted)?;
                self.confirm_payment(&intent_id).await?;
                (PaymentStatus::Completed, Some(intent_id))
            }
        };

        // ----- demo short-circuit -----
        let Some(store) = &self.store else {
            let order_id = format!("DEMO_{}", record::order_id(now));
            tracing::warn!(
                order_id = %order_id,
                customer_name = %submission.name,
                total = %priced.total,
                "Order store not configured - order not persisted (demo mode)"
            );
            return Ok(Receipt {
                outcome: Outcome::Demo,
                message: DEMO_MESSAGE.to_string(),
                order_id,
                total: priced.total,
                payment_status: None,
                payment_intent_id: None,
                warning: None,
            });
        };

        // ----- persist -----
        let order_id = record::order_id(now);
        let record = OrderRecord::build(
            &order_id,
            &submission,
            &priced,
            payment_status,
            payment_intent_id.as_deref(),
            now,
            self.tz,
        );

        let receipt = |outcome, message: &str, warning: Option<&str>| Receipt {
            outcome,
            message: message.to_string(),
            order_id: order_id.clone(),
            total: priced.total,
            payment_status: Some(payment_status),
            payment_intent_id: payment_intent_id.clone(),
            warning: warning.map(str::to_string),
        };

        match store.append_order(&record).await {
            Ok(handle) => {
                tracing::info!(
                    order_id = %handle.order_id,
                    range = handle.updated_range.as_deref().unwrap_or_default(),
                    payment_status = %payment_status,
                    "Order saved"
                );
                Ok(receipt(Outcome::Confirmed, CONFIRMED_MESSAGE, None))
            }
            Err(e) if e.is_permission_denied() => {
                self.dead_letter.record("degraded", &e.to_string(), &record).await;
                Ok(receipt(Outcome::Degraded, DEGRADED_MESSAGE, Some(DEGRADED_WARNING)))
            }
            Err(e) => {
                self.dead_letter.record("failed", &e.to_string(), &record).await;
                Err(SubmitError::Persistence(e))
            }
        }
    }

    /// A card order must reference an intent the gateway reports as
    /// settled. Without a configured gateway the client's confirmation is
    /// taken as given.
    async fn confirm_payment(&self, intent_id: &str) -> Result<(), SubmitError> {
        let Some(gateway) = &self.gateway else {
            tracing::warn!(payment_intent_id = %intent_id, "No payment gateway configured, intent not verified");
            return Ok(());
        };
        let intent = gateway.retrieve_intent(intent_id).await?;
        if !intent.is_succeeded() {
            tracing::warn!(payment_intent_id = %intent_id, status = %intent.status, "Payment intent not settled");
            return Err(SubmitError::PaymentNotCompleted);
        }
        Ok(())
    }
}
