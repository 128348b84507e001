// =============================================================================
// DEAD LETTER LOG
// =============================================================================
// Orders that were accepted from the customer's point of view but never made
// it into the order sheet. Each entry is logged at error level with the full
// order, and appended as one JSON line to DEAD_LETTER_PATH when configured,
// so the business can key it in by hand.
// =============================================================================

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::store::OrderRecord;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter<'a> {
    pub recorded_at: DateTime<Utc>,
    /// `degraded` (customer told success) or `failed`
    pub outcome: &'a str,
    pub reason: String,
    pub order: &'a OrderRecord,
}

#[derive(Debug, Clone, Default)]
pub struct DeadLetterLog {
    path: Option<PathBuf>,
}

impl DeadLetterLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Log-only; nothing is written to disk.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Never fails: a dead letter that cannot be written is still logged.
    pub async fn record(&self, outcome: &str, reason: &str, order: &OrderRecord) {
        let entry = DeadLetter {
            recorded_at: Utc::now(),
            outcome,
            reason: reason.to_string(),
            order,
        };

        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, order_id = %order.order_id, "Could not serialize dead letter");
                return;
            }
        };

        tracing::error!(
            order_id = %order.order_id,
            outcome = outcome,
            reason = reason,
            order = %line,
            "Order not saved to sheet - manual processing required"
        );

        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_line(path, &line).await {
            tracing::error!(error = %e, path = %path.display(), "Could not write dead letter file");
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(order_id: &str) -> OrderRecord {
        let mut row = vec![String::new(); crate::store::record::COLUMN_COUNT];
        row[1] = "Priya".to_string();
        row[12] = order_id.to_string();
        OrderRecord::from_row(&row)
    }

    #[tokio::test]
    async fn test_appends_one_json_line_per_order() {
        let path = std::env::temp_dir().join(format!(
            "storefront-dead-letter-{}.jsonl",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let log = DeadLetterLog::new(Some(path.clone()));

        log.record("degraded", "The caller does not have permission", &record("ORDER_1")).await;
        log.record("failed", "boom", &record("ORDER_2")).await;

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["outcome"], "degraded");
        assert_eq!(lines[0]["order"]["orderId"], "ORDER_1");
        assert_eq!(lines[1]["reason"], "boom");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_log_writes_nothing() {
        DeadLetterLog::disabled()
            .record("failed", "boom", &record("ORDER_3"))
            .await;
    }
}
