// =============================================================================
// CATALOG MODULE
// =============================================================================
// The storefront's product list. It is static: defined at compile time,
// shared read-only by every request, never mutated at runtime.
//
// NOTES:
// - Prices are stored in cents so the table can be built at compile time;
//   `Product::price()` lifts them into an exact `Decimal`.
// - Pricing a list of selections lives here too, because both the payment
//   gateway and the submission pipeline must agree on the authoritative
//   server-side total.
// =============================================================================

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// PRODUCT
// =============================================================================

/// Fixed set of shelves the storefront groups products under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sweets,
    Savories,
    #[serde(rename = "giftbox")]
    GiftBox,
}

impl Category {
    /// Display order on the storefront.
    pub const ALL: [Category; 3] = [Category::Sweets, Category::Savories, Category::GiftBox];
}

/// A purchasable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Stable string key, e.g. `"athirasam"`
    pub id: &'static str,

    /// Human-readable name shown on cards and in the order sheet
    pub name: &'static str,

    pub category: Category,

    /// Pack-size label, free text ("10 pcs", "1 kg", "Gift Box")
    pub pack_size: &'static str,

    /// Unit price in cents
    pub price_cents: u32,

    /// Image path served by the storefront
    pub image: &'static str,

    /// Contents blurb, only set for gift boxes
    pub description: Option<&'static str>,
}

impl Product {
    /// Unit price as an exact decimal (two places).
    pub fn price(&self) -> Decimal {
        Decimal::new(i64::from(self.price_cents), 2)
    }
}

// -----------------------------------------------------------------------------
// PRODUCT TABLE
// -----------------------------------------------------------------------------
const fn product(
    id: &'static str,
    name: &'static str,
    category: Category,
    pack_size: &'static str,
    price_cents: u32,
    image: &'static str,
) -> Product {
    Product {
        id,
        name,
        category,
        pack_size,
        price_cents,
        image,
        description: None,
    }
}

const fn gift_box(
    id: &'static str,
    name: &'static str,
    price_cents: u32,
    image: &'static str,
    description: &'static str,
) -> Product {
    Product {
        id,
        name,
        category: Category::GiftBox,
        pack_size: "Gift Box",
        price_cents,
        image,
        description: Some(description),
    }
}

static PRODUCTS: [Product; 17] = [
    // ----- Sweets -----
    product("athirasam", "Athirasam", Category::Sweets, "10 pcs", 1400, "/products/athirasam.jpeg"),
    product("mysore-pak", "Mysore Pak", Category::Sweets, "10 pcs", 1500, "/products/mysore-pak.jpeg"),
    product("badusha", "Badusha", Category::Sweets, "10 pcs", 1400, "/products/badusha.jpeg"),
    product("coconut-laddu", "Coconut Laddu", Category::Sweets, "10 pcs", 1300, "/products/coconut-laddu.jpeg"),
    product("boondi-laddu", "Boondi Laddu", Category::Sweets, "10 pcs", 1300, "/products/boondi-laddu.jpeg"),
    product("gulab-jamun", "Gulab Jamun (Dry)", Category::Sweets, "10 pcs", 1200, "/products/gulab-jamun.jpeg"),
    product("dates-nuts-rolls", "Dates and Nuts Rolls", Category::Sweets, "10 pcs", 1500, "/products/dates-nuts-rolls.jpeg"),
    product("thirunelveli-halwa", "Thirunelveli Halwa", Category::Sweets, "½ kg", 2600, "/products/halva.jpeg"),
    product("rava-laddu", "Rava Laddu", Category::Sweets, "10 pcs", 900, "/products/rava-laddu.jpeg"),
    // ----- Savories -----
    product("ribbon-pakoda", "Ribbon Pakoda", Category::Savories, "1 kg", 2000, "/products/ribbon-pakoda.jpeg"),
    product("tamilnadu-mixture", "Tamilnadu Mixture", Category::Savories, "1 kg", 1800, "/products/tamilnadu-mixture.jpeg"),
    product("kara-boondi", "Kara Boondi", Category::Savories, "1 kg", 1800, "/products/kara-boondi.jpeg"),
    product("thenkuzhal", "Thenkuzhal", Category::Savories, "15 pcs", 1800, "/products/thenkuzhal.jpeg"),
    product("kara-sev", "Kara Sev", Category::Savories, "1 kg", 1900, "/products/kara-sev.jpeg"),
    // ----- Gift boxes -----
    gift_box(
        "diwali-kadambam",
        "Diwali Kadambam",
        2999,
        "/products/athirasam.jpeg",
        "Ghee Athirasam, Mysore Pak, Rava Laddu (150 gms) • Tamilnadu Mixture, Ribbon Pakoda (250 gms)",
    ),
    gift_box(
        "authentic",
        "Authentic",
        1999,
        "/products/boondi-laddu.jpeg",
        "Boondi Laddu (3 pcs) • Rava Laddu (3 pcs) • Coconut Laddu (3 pcs) • Thirunelveli Halwa (3 pcs)",
    ),
    gift_box(
        "authentic-special",
        "Authentic Special",
        2499,
        "/products/badusha.jpeg",
        "Badusha (4 pcs) • Dates N' nuts Rolls (4 pcs) • Badam Peda (4 pcs) • Dry Jamoon (4 pcs)",
    ),
];

// =============================================================================
// CATALOG
// =============================================================================

/// Read-only view over a product table.
///
/// `Catalog::default()` is the storefront's built-in table; tests can build
/// a catalog over their own slice with `Catalog::new`.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    products: &'static [Product],
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(&PRODUCTS)
    }
}

impl Catalog {
    pub fn new(products: &'static [Product]) -> Self {
        Self { products }
    }

    pub fn products(&self) -> &'static [Product] {
        self.products
    }

    /// Look up a product by its stable id.
    pub fn get(&self, id: &str) -> Option<&'static Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &'static Product> {
        self.products.iter().filter(move |p| p.category == category)
    }

    /// Resolve selections against the catalog and compute line totals and
    /// the grand total. The client's idea of the price is never consulted.
    pub fn price(&self, selections: &[Selection]) -> Result<PricedOrder, CatalogError> {
        let lines = selections
            .iter()
            .map(|s| {
                let product = self
                    .get(&s.product_id)
                    .ok_or_else(|| CatalogError::ProductNotFound(s.product_id.clone()))?;
                Ok(SelectedProduct::new(product, s.quantity))
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        Ok(PricedOrder::from_lines(lines))
    }
}

// =============================================================================
// SELECTIONS & PRICING
// =============================================================================

/// `{productId, quantity}` pair as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub product_id: String,
    pub quantity: u32,
}

/// A resolved cart line: product, quantity and rounded line total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedProduct {
    pub product: &'static Product,
    pub quantity: u32,
    pub line_total: Decimal,
}

impl SelectedProduct {
    pub fn new(product: &'static Product, quantity: u32) -> Self {
        Self {
            product,
            quantity,
            line_total: round_money(product.price() * Decimal::from(quantity)),
        }
    }
}

/// Selections after server-side pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<SelectedProduct>,
    pub total: Decimal,
}

impl PricedOrder {
    pub fn from_lines(lines: Vec<SelectedProduct>) -> Self {
        let total = round_money(lines.iter().map(|l| l.line_total).sum());
        Self { lines, total }
    }

    /// Sum of quantities across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Round to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn sel(id: &str, quantity: u32) -> Selection {
        Selection {
            product_id: id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_catalog_has_unique_ids() {
        let catalog = Catalog::default();
        let mut ids: Vec<_> = catalog.products().iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.products().len());
    }

    #[test]
    fn test_grouping_by_category() {
        let catalog = Catalog::default();
        assert_eq!(catalog.by_category(Category::Sweets).count(), 9);
        assert_eq!(catalog.by_category(Category::Savories).count(), 5);
        assert_eq!(catalog.by_category(Category::GiftBox).count(), 3);
        assert!(catalog
            .by_category(Category::GiftBox)
            .all(|p| p.description.is_some()));
    }

    #[test]
    fn test_athirasam_two_packs() {
        let priced = Catalog::default().price(&[sel("athirasam", 2)]).unwrap();
        assert_eq!(priced.lines[0].line_total, Decimal::new(2800, 2));
        assert_eq!(priced.total, Decimal::new(2800, 2));
    }

    #[test]
    fn test_total_is_exact_for_fractional_prices() {
        let priced = Catalog::default()
            .price(&[sel("diwali-kadambam", 3), sel("authentic", 1), sel("rava-laddu", 2)])
            .unwrap();
        // 89.97 + 19.99 + 18.00
        assert_eq!(priced.total, Decimal::new(12796, 2));
        assert_eq!(priced.total_quantity(), 6);
    }

    #[test]
    fn test_unknown_product_is_rejected() {
        let err = Catalog::default()
            .price(&[sel("athirasam", 1), sel("ghost", 1)])
            .unwrap_err();
        assert_eq!(err, CatalogError::ProductNotFound("ghost".to_string()));
    }

    #[test]
    fn test_category_wire_names() {
        let json = serde_json::to_string(&Category::ALL).unwrap();
        assert_eq!(json, r#"["sweets","savories","giftbox"]"#);
    }
}
