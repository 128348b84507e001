// =============================================================================
// VALIDATION MODULE
// =============================================================================
// Turns an untyped JSON submission into a typed `OrderSubmission`, or a list
// of field-level errors. Nothing untyped travels past this point.
//
// Rules:
// - name: trimmed length 2..=50
// - phone: exactly "(XXX) XXX-XXXX"
// - email: optional; when present and non-empty, one '@' and a dot after it
// - paymentMethod: "cash" or "stripe"
// - pickupDate: today or later in the business timezone (date only)
// - selectedProducts: non-empty; quantities are integers in 1..=999
//
// Product ids are NOT resolved here; the pipeline checks them against the
// catalog.
// =============================================================================

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cart::MAX_QUANTITY;
use crate::catalog::Selection;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Pay at pickup
    Cash,
    /// Card via the payment gateway
    Stripe,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Stripe => "stripe",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submission that passed every schema rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub payment_method: PaymentMethod,
    pub pickup_date: NaiveDate,
    pub selected_products: Vec<Selection>,
    /// Confirmed card payment, only meaningful for `PaymentMethod::Stripe`
    pub payment_intent_id: Option<String>,
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid order data")]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

// =============================================================================
// PATTERNS
// =============================================================================

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\([0-9]{3}\) [0-9]{3}-[0-9]{4}$").expect("phone pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

pub fn is_valid_phone(phone: &str) -> bool {
    phone_pattern().is_match(phone)
}

/// Empty input counts as valid: the field is optional.
pub fn is_valid_email(email: &str) -> bool {
    email.is_empty() || email_pattern().is_match(email)
}

/// Progressive phone mask used while the shopper types.
///
/// Non-digits are dropped; from six digits on the value reads
/// `(ddd) ddd-dddd` (extra digits are cut), from three `(ddd) rest`.
pub fn format_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let n = digits.len();
    if n >= 6 {
        let end = n.min(10);
        format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..end])
    } else if n >= 3 {
        format!("({}) {}", &digits[..3], &digits[3..])
    } else {
        digits
    }
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Validate a raw payload. `today` is the calendar date in the business
/// timezone `tz`, which is also used to read timestamped pickup dates.
pub fn validate_order(
    payload: &Value,
    today: NaiveDate,
    tz: Tz,
) -> Result<OrderSubmission, ValidationErrors> {
    let mut errors = Vec::new();

    // ----- name -----
    let name = match payload.get("name").and_then(Value::as_str) {
        Some(raw) => {
            let trimmed = raw.trim();
            let len = trimmed.chars().count();
            if len < 2 {
                errors.push(FieldError::new("name", "Name must be at least 2 characters"));
            } else if len > 50 {
                errors.push(FieldError::new("name", "Name is too long"));
            }
            trimmed.to_string()
        }
        None => {
            errors.push(FieldError::new("name", "Name is required"));
            String::new()
        }
    };

    // ----- phone -----
    let phone = payload
        .get("phone")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !is_valid_phone(&phone) {
        errors.push(FieldError::new("phone", "Phone must be in format (XXX) XXX-XXXX"));
    }

    // ----- email -----
    let email = match payload.get("email") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => {
            if !is_valid_email(s.trim()) {
                errors.push(FieldError::new("email", "Invalid email format"));
            }
            Some(s.trim().to_string())
        }
        Some(_) => {
            errors.push(FieldError::new("email", "Invalid email format"));
            None
        }
    };

    // ----- paymentMethod -----
    let payment_method = match payload.get("paymentMethod").and_then(Value::as_str) {
        Some("cash") => Some(PaymentMethod::Cash),
        Some("stripe") => Some(PaymentMethod::Stripe),
        _ => {
            errors.push(FieldError::new("paymentMethod", "Please select a payment method"));
            None
        }
    };

    // ----- pickupDate -----
    let pickup_date = match payload
        .get("pickupDate")
        .and_then(Value::as_str)
        .and_then(|s| parse_pickup_date(s, tz))
    {
        Some(date) if date >= today => Some(date),
        Some(_) => {
            errors.push(FieldError::new(
                "pickupDate",
                "Pickup date must be today or in the future",
            ));
            None
        }
        None => {
            errors.push(FieldError::new("pickupDate", "Please select a valid pickup date"));
            None
        }
    };

    // ----- selectedProducts -----
    let selected_products = validate_selections(payload.get("selectedProducts"), &mut errors);

    let payment_intent_id = payload
        .get("paymentIntentId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    match (payment_method, pickup_date) {
        (Some(payment_method), Some(pickup_date)) if errors.is_empty() => Ok(OrderSubmission {
            name,
            phone,
            email,
            payment_method,
            pickup_date,
            selected_products,
            payment_intent_id,
        }),
        _ => Err(ValidationErrors(errors)),
    }
}

/// Shared by the submission and payment-intent endpoints.
pub fn validate_selections(value: Option<&Value>, errors: &mut Vec<FieldError>) -> Vec<Selection> {
    let Some(items) = value.and_then(Value::as_array) else {
        errors.push(FieldError::new(
            "selectedProducts",
            "Please select at least one product",
        ));
        return Vec::new();
    };
    if items.is_empty() {
        errors.push(FieldError::new(
            "selectedProducts",
            "Please select at least one product",
        ));
    }

    let mut selections = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let product_id = item.get("productId").and_then(Value::as_str);
        let quantity = item.get("quantity").and_then(Value::as_u64);

        let Some(product_id) = product_id else {
            errors.push(FieldError::new(
                format!("selectedProducts.{i}.productId"),
                "Product id is required",
            ));
            continue;
        };
        match quantity {
            Some(q) if (1..=u64::from(MAX_QUANTITY)).contains(&q) => selections.push(Selection {
                product_id: product_id.to_string(),
                quantity: q as u32,
            }),
            Some(q) if q > u64::from(MAX_QUANTITY) => errors.push(FieldError::new(
                format!("selectedProducts.{i}.quantity"),
                "Quantity cannot exceed 999",
            )),
            _ => errors.push(FieldError::new(
                format!("selectedProducts.{i}.quantity"),
                "Quantity must be a whole number of at least 1",
            )),
        }
    }
    selections
}

/// Accepts `YYYY-MM-DD`, `MM/DD/YYYY` or an RFC 3339 timestamp. Timestamps
/// are moved into the business timezone before the date is taken.
fn parse_pickup_date(raw: &str, tz: Tz) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&tz).date_naive())
        })
}
