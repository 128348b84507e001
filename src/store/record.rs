// =============================================================================
// ORDER RECORD
// =============================================================================
// One row of the "Orders" sheet. Column order is a positional contract
// shared by the writer (`to_row`) and the admin reader (`from_row`):
//
//   A timestamp | B name | C phone | D email | E products | F total
//   G method | H payment status | I intent id | J pickup date
//   K product types | L total quantity | M order id
// =============================================================================

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{round_money, PricedOrder};
use crate::validation::OrderSubmission;

use super::summary::format_product_summary;

pub const COLUMN_COUNT: usize = 13;

/// Placeholder written for absent optional values.
pub const NOT_AVAILABLE: &str = "N/A";

pub const HEADER_ROW: [&str; COLUMN_COUNT] = [
    "Order Date & Time",
    "Customer Name",
    "Phone Number",
    "Email Address",
    "Products Ordered",
    "Total Amount",
    "Payment Method",
    "Payment Status",
    "Payment Intent ID",
    "Pickup Date",
    "Product Types",
    "Total Quantity",
    "Order ID",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Cash, settled at pickup
    Pending,
    /// Card payment confirmed before submission
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// FORMATTING
// -----------------------------------------------------------------------------

/// `$28.00`
pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", round_money(amount))
}

/// Inverse of `format_money`, tolerating thousands separators; zero when
/// unreadable.
pub fn parse_money(cell: &str) -> Decimal {
    cell.trim()
        .trim_start_matches('$')
        .replace(',', "")
        .parse()
        .unwrap_or_default()
}

/// `10/20/2026`
pub fn format_pickup_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// `10/17/2026, 03:04:05 PM` in the business timezone.
pub fn format_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz)
        .format("%m/%d/%Y, %I:%M:%S %p")
        .to_string()
}

/// Order ids are the submission time in epoch millis.
pub fn order_id(at: DateTime<Utc>) -> String {
    format!("ORDER_{}", at.timestamp_millis())
}

// =============================================================================
// RECORD
// =============================================================================

/// A persisted order, every column already rendered as sheet text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_date: String,
    pub customer_name: String,
    pub phone: String,
    pub email: String,
    pub products: String,
    pub total_amount: String,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_intent_id: String,
    pub pickup_date: String,
    pub product_types: String,
    pub total_quantity: String,
    pub order_id: String,
}

impl OrderRecord {
    /// Render a validated, priced order into sheet columns.
    pub fn build(
        order_id: &str,
        submission: &OrderSubmission,
        priced: &PricedOrder,
        payment_status: PaymentStatus,
        payment_intent_id: Option<&str>,
        placed_at: DateTime<Utc>,
        tz: Tz,
    ) -> Self {
        Self {
            order_date: format_timestamp(placed_at, tz),
            customer_name: submission.name.clone(),
            phone: submission.phone.clone(),
            email: submission
                .email
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            products: format_product_summary(&priced.lines),
            total_amount: format_money(priced.total),
            payment_method: submission.payment_method.to_string(),
            payment_status: payment_status.to_string(),
            payment_intent_id: payment_intent_id.unwrap_or(NOT_AVAILABLE).to_string(),
            pickup_date: format_pickup_date(submission.pickup_date),
            product_types: priced.lines.len().to_string(),
            total_quantity: priced.total_quantity().to_string(),
            order_id: order_id.to_string(),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.order_date.clone(),
            self.customer_name.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.products.clone(),
            self.total_amount.clone(),
            self.payment_method.clone(),
            self.payment_status.clone(),
            self.payment_intent_id.clone(),
            self.pickup_date.clone(),
            self.product_types.clone(),
            self.total_quantity.clone(),
            self.order_id.clone(),
        ]
    }

    /// Read a row back. The sheet API drops trailing empty cells, so short
    /// rows are padded with empty strings.
    pub fn from_row(row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        Self {
            order_date: cell(0),
            customer_name: cell(1),
            phone: cell(2),
            email: cell(3),
            products: cell(4),
            total_amount: cell(5),
            payment_method: cell(6),
            payment_status: cell(7),
            payment_intent_id: cell(8),
            pickup_date: cell(9),
            product_types: cell(10),
            total_quantity: cell(11),
            order_id: cell(12),
        }
    }

    /// The total column parsed back into a number; zero when unreadable.
    pub fn total(&self) -> Decimal {
        parse_money(&self.total_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Selection};
    use crate::validation::PaymentMethod;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn submission(email: Option<&str>) -> OrderSubmission {
        OrderSubmission {
            name: "Priya Raman".to_string(),
            phone: "(555) 123-4567".to_string(),
            email: email.map(str::to_string),
            payment_method: PaymentMethod::Cash,
            pickup_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            selected_products: vec![],
            payment_intent_id: None,
        }
    }

    fn priced() -> PricedOrder {
        Catalog::default()
            .price(&[
                Selection {
                    product_id: "athirasam".to_string(),
                    quantity: 2,
                },
                Selection {
                    product_id: "kara-sev".to_string(),
                    quantity: 3,
                },
            ])
            .unwrap()
    }

    #[test]
    fn test_build_renders_thirteen_columns() {
        let placed_at = Utc.with_ymd_and_hms(2026, 10, 17, 19, 4, 5).unwrap();
        let record = OrderRecord::build(
            "ORDER_1",
            &submission(None),
            &priced(),
            PaymentStatus::Pending,
            None,
            placed_at,
            New_York,
        );
        let row = record.to_row();

        assert_eq!(row.len(), COLUMN_COUNT);
        assert_eq!(row[0], "10/17/2026, 03:04:05 PM");
        assert_eq!(row[3], NOT_AVAILABLE);
        assert_eq!(row[5], "$85.00");
        assert_eq!(row[6], "cash");
        assert_eq!(row[7], "pending");
        assert_eq!(row[8], NOT_AVAILABLE);
        assert_eq!(row[9], "10/20/2026");
        assert_eq!(row[10], "2");
        assert_eq!(row[11], "5");
        assert_eq!(row[12], "ORDER_1");
    }

    #[test]
    fn test_from_row_pads_short_rows() {
        let row = vec!["10/17/2026, 03:04:05 PM".to_string(), "Priya".to_string()];
        let record = OrderRecord::from_row(&row);
        assert_eq!(record.customer_name, "Priya");
        assert_eq!(record.order_id, "");
        assert_eq!(record.total(), Decimal::ZERO);
    }

    #[test]
    fn test_row_round_trip_keeps_positions() {
        let record = OrderRecord::build(
            "ORDER_2",
            &submission(Some("p@example.com")),
            &priced(),
            PaymentStatus::Completed,
            Some("pi_9"),
            Utc::now(),
            New_York,
        );
        assert_eq!(OrderRecord::from_row(&record.to_row()), record);
        assert_eq!(record.total(), Decimal::new(8500, 2));
    }

    #[test]
    fn test_parse_money_reads_formatted_totals() {
        assert_eq!(parse_money(&format_money(Decimal::new(2800, 2))), Decimal::new(2800, 2));
        assert_eq!(parse_money(" $1,234.50 "), Decimal::new(123450, 2));
        assert_eq!(parse_money("N/A"), Decimal::ZERO);
    }

    #[test]
    fn test_order_id_uses_epoch_millis() {
        let at = Utc.timestamp_millis_opt(1_792_000_000_123).unwrap();
        assert_eq!(order_id(at), "ORDER_1792000000123");
    }

    #[test]
    fn test_header_matches_column_count() {
        assert_eq!(HEADER_ROW.len(), COLUMN_COUNT);
        assert_eq!(HEADER_ROW[12], "Order ID");
    }
}
