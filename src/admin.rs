// =============================================================================
// ADMIN VIEW
// =============================================================================
// Read side of the order sheet: bearer check, row reshaping, dashboard
// filters and figures, and the detail view that parses the product summary
// back into lines. Every call works on a fresh full listing from the store.
// =============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::record::parse_money;
use crate::store::summary::{parse_product_summary, SummaryLine};
use crate::store::{PaymentStatus, StoredOrder};

/// `Authorization` must be exactly `Bearer <key>`.
pub fn is_authorized(header: Option<&str>, api_key: &str) -> bool {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| token == api_key)
}

// =============================================================================
// ORDER VIEW
// =============================================================================

/// A sheet row reshaped into named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    /// 1-based data row number
    pub id: usize,
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

impl From<StoredOrder> for OrderView {
    fn from(stored: StoredOrder) -> Self {
        let r = stored.record;
        Self {
            id: stored.row,
            order_date: r.order_date,
            customer_name: r.customer_name,
            phone: r.phone,
            email: r.email,
            products: r.products,
            total_amount: r.total_amount,
            payment_method: r.payment_method,
            payment_status: r.payment_status,
            payment_intent_id: r.payment_intent_id,
            pickup_date: r.pickup_date,
            product_types: r.product_types,
            total_quantity: r.total_quantity,
            order_id: r.order_id,
        }
    }
}

impl OrderView {
    fn total(&self) -> Decimal {
        parse_money(&self.total_amount)
    }

    fn has_status(&self, status: PaymentStatus) -> bool {
        self.payment_status == status.as_str()
    }

    fn matches_search(&self, term: &str) -> bool {
        let term_lower = term.to_lowercase();
        self.customer_name.to_lowercase().contains(&term_lower)
            || self.phone.contains(term)
            || self.email.to_lowercase().contains(&term_lower)
            || self.order_id.to_lowercase().contains(&term_lower)
    }
}

// =============================================================================
// FILTERS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: StatusFilter,
}

/// Apply the dashboard search box and status dropdown. Order is preserved.
pub fn filter_orders(orders: Vec<OrderView>, query: &OrderQuery) -> Vec<OrderView> {
    let term = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty());

    orders
        .into_iter()
        .filter(|o| term.map_or(true, |t| o.matches_search(t)))
        .filter(|o| match query.status {
            StatusFilter::All => true,
            StatusFilter::Pending => o.has_status(PaymentStatus::Pending),
            StatusFilter::Completed => o.has_status(PaymentStatus::Completed),
        })
        .collect()
}

// =============================================================================
// DASHBOARD FIGURES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: usize,
    pub completed_orders: usize,
    pub pending_orders: usize,
    /// Sum over completed orders only
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
}

pub fn order_stats(orders: &[OrderView]) -> OrderStats {
    let completed: Vec<&OrderView> = orders
        .iter()
        .filter(|o| o.has_status(PaymentStatus::Completed))
        .collect();

    OrderStats {
        total_orders: orders.len(),
        completed_orders: completed.len(),
        pending_orders: orders
            .iter()
            .filter(|o| o.has_status(PaymentStatus::Pending))
            .count(),
        total_revenue: completed.iter().map(|o| o.total()).sum(),
    }
}

// =============================================================================
// DETAIL VIEW
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub order: OrderView,
    pub lines: Vec<SummaryLine>,
}

/// Look an order up by its generated id and parse its product summary.
pub fn order_detail(orders: Vec<OrderView>, order_id: &str) -> Option<OrderDetail> {
    let order = orders.into_iter().find(|o| o.order_id == order_id)?;
    let lines = parse_product_summary(&order.products);
    Some(OrderDetail { order, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OrderRecord;

    fn view(row: usize, name: &str, status: &str, total: &str) -> OrderView {
        let mut cells = vec![String::new(); crate::store::record::COLUMN_COUNT];
        cells[1] = name.to_string();
        cells[2] = "(555) 123-4567".to_string();
        cells[3] = format!("{}@example.com", name.to_lowercase());
        cells[4] = "1. Badusha (10 pcs) - Qty: 1 = $14.00".to_string();
        cells[5] = total.to_string();
        cells[7] = status.to_string();
        cells[12] = format!("ORDER_{row}");
        OrderView::from(StoredOrder {
            row,
            record: OrderRecord::from_row(&cells),
        })
    }

    fn orders() -> Vec<OrderView> {
        vec![
            view(3, "Meena", "completed", "$29.99"),
            view(2, "Arun", "pending", "$14.00"),
            view(1, "Lakshmi", "completed", "$1,200.50"),
        ]
    }

    #[test]
    fn test_bearer_must_match_exactly() {
        assert!(is_authorized(Some("Bearer s3cret"), "s3cret"));
        assert!(!is_authorized(Some("Bearer wrong"), "s3cret"));
        assert!(!is_authorized(Some("bearer s3cret"), "s3cret"));
        assert!(!is_authorized(Some("s3cret"), "s3cret"));
        assert!(!is_authorized(None, "s3cret"));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let query = OrderQuery {
            search: Some("MEENA".to_string()),
            status: StatusFilter::All,
        };
        let found = filter_orders(orders(), &query);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].order_id, "ORDER_3");

        let by_id = OrderQuery {
            search: Some("order_2".to_string()),
            status: StatusFilter::All,
        };
        assert_eq!(filter_orders(orders(), &by_id)[0].customer_name, "Arun");
    }

    #[test]
    fn test_status_filter_keeps_order() {
        let query = OrderQuery {
            search: None,
            status: StatusFilter::Completed,
        };
        let ids: Vec<_> = filter_orders(orders(), &query)
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, [3, 1]);
    }

    #[test]
    fn test_blank_search_matches_everything() {
        let query = OrderQuery {
            search: Some("  ".to_string()),
            status: StatusFilter::All,
        };
        assert_eq!(filter_orders(orders(), &query).len(), 3);
    }

    #[test]
    fn test_stats_count_revenue_from_completed_only() {
        let stats = order_stats(&orders());
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.completed_orders, 2);
        assert_eq!(stats.pending_orders, 1);
        assert_eq!(stats.total_revenue, Decimal::new(123049, 2));
    }

    #[test]
    fn test_detail_parses_summary_lines() {
        let detail = order_detail(orders(), "ORDER_2").unwrap();
        assert_eq!(detail.order.customer_name, "Arun");
        assert!(matches!(
            &detail.lines[..],
            [SummaryLine::Parsed { name, quantity: 1, .. }] if name == "Badusha"
        ));
        assert!(order_detail(orders(), "ORDER_404").is_none());
    }
}
