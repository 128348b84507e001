// =============================================================================
// ORDER STORE MODULE
// =============================================================================
// The order book is an append-only spreadsheet tab named "Orders".
//
// - `OrderStore` is the seam the pipeline and admin handlers depend on.
// - `sheets::SheetsStore` is the Google Sheets implementation.
// - `record` owns the 13-column row contract; `summary` owns the product
//   summary grammar the admin view parses back.
//
// Errors are classified so the pipeline can single out permission problems
// (degraded success) from everything else (hard failure).
// =============================================================================

pub mod record;
pub mod sheets;
pub mod summary;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

pub use record::{OrderRecord, PaymentStatus};

/// Name of the sheet tab holding orders.
pub const ORDERS_SHEET: &str = "Orders";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    /// The credential can read or reach the sheet but may not write to it.
    #[error("The caller does not have permission")]
    PermissionDenied,

    #[error("Spreadsheet not found - check GOOGLE_SHEETS_SPREADSHEET_ID")]
    NotFound,

    #[error("Authentication failed - check service account credentials: {0}")]
    Unauthenticated(String),

    #[error("Failed to create header row: {0}")]
    HeaderWrite(String),

    #[error("Failed to save order to the order sheet: {0}")]
    AppendFailed(String),

    #[error("Failed to read orders: {0}")]
    ReadFailed(String),

    #[error("Order sheet unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

impl StoreError {
    /// Whether the pipeline may downgrade this failure to a warning.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied)
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Where an appended row landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle {
    pub order_id: String,
    /// e.g. `Orders!A7:M7`, when the API reports it
    pub updated_range: Option<String>,
}

/// A row read back from the sheet with its 1-based data row number
/// (row 2 of the sheet is data row 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOrder {
    pub row: usize,
    pub record: OrderRecord,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write the header row when row 1 is empty or the tab is missing.
    async fn ensure_header(&self) -> Result<(), StoreError>;

    /// Ensure the header, then append one row.
    async fn append_order(&self, record: &OrderRecord) -> Result<RecordHandle, StoreError>;

    /// Every data row, most recent first. Re-reads the whole sheet on
    /// each call.
    async fn list_orders(&self) -> Result<Vec<StoredOrder>, StoreError>;
}
