// =============================================================================
// CART MODULE
// =============================================================================
// The shopper's working selection before checkout.
//
// A `Cart` is a plain value owned by whoever drives the checkout (the
// storefront session, or `client::OrderClient` callers). Views borrow it
// read-only; it only changes through `select`, `deselect`,
// `change_quantity` and `clear`.
// =============================================================================

use rust_decimal::Decimal;

use crate::catalog::{round_money, Catalog, CatalogError, SelectedProduct, Selection};

/// Largest quantity the quantity picker accepts for one line.
pub const MAX_QUANTITY: u32 = 999;

#[derive(Debug, Clone)]
pub struct Cart {
    catalog: Catalog,
    lines: Vec<SelectedProduct>,
}

impl Cart {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            lines: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // MUTATIONS
    // -------------------------------------------------------------------------

    /// Tick a product. Selecting an already selected product replaces its
    /// quantity rather than adding to it.
    pub fn select(&mut self, product_id: &str, quantity: u32) -> Result<(), CatalogError> {
        let product = self
            .catalog
            .get(product_id)
            .ok_or_else(|| CatalogError::ProductNotFound(product_id.to_string()))?;
        let line = SelectedProduct::new(product, clamp_quantity(quantity));

        match self.lines.iter_mut().find(|l| l.product.id == product_id) {
            Some(existing) => *existing = line,
            None => self.lines.push(line),
        }
        Ok(())
    }

    /// Untick a product. Returns whether it was selected.
    pub fn deselect(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product.id != product_id);
        self.lines.len() != before
    }

    /// Update the quantity of a selected line, clamped to `1..=999`.
    pub fn change_quantity(&mut self, product_id: &str, quantity: u32) -> Result<(), CatalogError> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product.id == product_id)
            .ok_or_else(|| CatalogError::ProductNotFound(product_id.to_string()))?;
        *line = SelectedProduct::new(line.product, clamp_quantity(quantity));
        Ok(())
    }

    /// Empty the cart after a successful submission.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    // -------------------------------------------------------------------------
    // READS
    // -------------------------------------------------------------------------

    pub fn lines(&self) -> &[SelectedProduct] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total(&self) -> Decimal {
        round_money(self.lines.iter().map(|l| l.line_total).sum())
    }

    /// The `{productId, quantity}` list sent to the server.
    pub fn selections(&self) -> Vec<Selection> {
        self.lines
            .iter()
            .map(|l| Selection {
                product_id: l.product.id.to_string(),
                quantity: l.quantity,
            })
            .collect()
    }
}

fn clamp_quantity(quantity: u32) -> u32 {
    quantity.clamp(1, MAX_QUANTITY)
}
