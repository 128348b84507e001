// =============================================================================
// GOOGLE SHEETS STORE
// =============================================================================
// `OrderStore` over the Sheets v4 REST API.
//
// Authentication uses a service account: an RS256-signed assertion is
// exchanged for a short-lived access token. Every unit of work (one append,
// one listing) fetches its own token; nothing is cached between requests.
//
// Header bootstrap is check-then-write and not guarded against two
// concurrent first writers.
// =============================================================================

use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::metrics;

use super::record::{HEADER_ROW, COLUMN_COUNT};
use super::{OrderRecord, OrderStore, RecordHandle, StoreError, StoredOrder, ORDERS_SHEET};

const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Service-account credentials plus the target spreadsheet.
#[derive(Clone)]
pub struct SheetsCredentials {
    pub client_email: String,
    /// PEM; literal `\n` sequences (as stored in env files) are accepted
    pub private_key: String,
    pub spreadsheet_id: String,
}

impl std::fmt::Debug for SheetsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish()
    }
}

// =============================================================================
// SERVICE ACCOUNT AUTH
// =============================================================================

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone)]
struct ServiceAccountAuth {
    client_email: String,
    key: EncodingKey,
    token_uri: String,
}

impl ServiceAccountAuth {
    async fn access_token(&self, http: &Client) -> Result<String, StoreError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| StoreError::Unauthenticated(e.to_string()))?;

        let response = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Unauthenticated(format!("token exchange returned {status}: {text}")));
        }

        Ok(response.json::<TokenResponse>().await?.access_token)
    }
}

// =============================================================================
// API SHAPES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_range: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<serde_json::Value>,
}

/// Map an API failure onto the store taxonomy. `fallback` wraps anything
/// that is not an auth/permission/not-found status.
fn classify(status: StatusCode, body: &str, fallback: fn(String) -> StoreError) -> StoreError {
    match status {
        StatusCode::FORBIDDEN => StoreError::PermissionDenied,
        StatusCode::NOT_FOUND => StoreError::NotFound,
        StatusCode::UNAUTHORIZED => StoreError::Unauthenticated(body.to_string()),
        _ => fallback(format!("{status}: {body}")),
    }
}

async fn decode_range(response: reqwest::Response) -> Result<ValueRange, StoreError> {
    response
        .json::<ValueRange>()
        .await
        .map_err(|e| StoreError::ReadFailed(format!("unreadable value range: {e}")))
}

async fn check(response: reqwest::Response, fallback: fn(String) -> StoreError) -> Result<reqwest::Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(classify(status, &text, fallback))
}

// =============================================================================
// SHEETS STORE
// =============================================================================

#[derive(Clone)]
pub struct SheetsStore {
    http: Client,
    api_base: String,
    spreadsheet_id: String,
    auth: ServiceAccountAuth,
}

impl std::fmt::Debug for SheetsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsStore")
            .field("api_base", &self.api_base)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish_non_exhaustive()
    }
}

impl SheetsStore {
    /// Build a store. Fails when the private key is not a readable RSA PEM.
    pub fn new(
        http: Client,
        credentials: &SheetsCredentials,
        api_base: impl Into<String>,
        token_uri: impl Into<String>,
    ) -> Result<Self> {
        let pem = credentials.private_key.replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .context("GOOGLE_SHEETS_PRIVATE_KEY is not a valid RSA private key")?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            spreadsheet_id: credentials.spreadsheet_id.clone(),
            auth: ServiceAccountAuth {
                client_email: credentials.client_email.clone(),
                key,
                token_uri: token_uri.into(),
            },
        })
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/v4/spreadsheets/{}", self.api_base, self.spreadsheet_id)
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/values/{}", self.spreadsheet_url(), range)
    }

    async fn read_range(&self, token: &str, range: &str) -> Result<ValueRange, StoreError> {
        let response = self
            .http
            .get(self.values_url(range))
            .bearer_auth(token)
            .send()
            .await?;
        let response = check(response, StoreError::ReadFailed).await?;
        decode_range(response).await
    }

    // -------------------------------------------------------------------------
    // HEADER BOOTSTRAP
    // -------------------------------------------------------------------------

    /// An error status (missing tab included) means "no header". A 200 whose
    /// body cannot be read is an error, so an existing header is never
    /// overwritten on a bad read.
    async fn header_present(&self, token: &str) -> Result<bool, StoreError> {
        let response = self
            .http
            .get(self.values_url(&format!("{ORDERS_SHEET}!A1:M1")))
            .bearer_auth(token)
            .send()
            .await?;
        let response = match check(response, StoreError::ReadFailed).await {
            Ok(response) => response,
            Err(e) => {
                tracing::info!(error = %e, "Could not read header row, creating it");
                return Ok(false);
            }
        };

        let value_range = decode_range(response).await?;
        Ok(value_range
            .values
            .first()
            .and_then(|row| row.first())
            .is_some_and(|cell| !cell.trim().is_empty()))
    }

    /// Id of the Orders tab, creating the tab when it does not exist.
    async fn orders_sheet_id(&self, token: &str) -> Result<i64, StoreError> {
        let response = self
            .http
            .get(self.spreadsheet_url())
            .query(&[("fields", "sheets.properties")])
            .bearer_auth(token)
            .send()
            .await?;
        let meta: SpreadsheetMeta = check(response, StoreError::HeaderWrite).await?.json().await?;

        if let Some(sheet) = meta.sheets.iter().find(|s| s.properties.title == ORDERS_SHEET) {
            return Ok(sheet.properties.sheet_id);
        }

        tracing::info!(sheet = ORDERS_SHEET, "Creating order sheet tab");
        let response = self
            .http
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .bearer_auth(token)
            .json(&json!({
                "requests": [{"addSheet": {"properties": {"title": ORDERS_SHEET}}}]
            }))
            .send()
            .await?;
        let reply: BatchUpdateResponse = check(response, StoreError::HeaderWrite).await?.json().await?;

        reply
            .replies
            .first()
            .and_then(|r| r.pointer("/addSheet/properties/sheetId"))
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| StoreError::HeaderWrite("addSheet reply had no sheet id".to_string()))
    }

    async fn write_header(&self, token: &str) -> Result<i64, StoreError> {
        let sheet_id = self.orders_sheet_id(token).await?;
        let range = format!("{ORDERS_SHEET}!A1:M1");

        let response = self
            .http
            .put(self.values_url(&range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [HEADER_ROW],
            }))
            .send()
            .await?;
        check(response, StoreError::HeaderWrite).await?;

        tracing::info!(spreadsheet_id = %self.spreadsheet_id, "Header row written");
        Ok(sheet_id)
    }

    /// Bold white-on-blue header, centred, columns auto-sized. Cosmetic:
    /// failures are logged and dropped.
    async fn format_header(&self, token: &str, sheet_id: i64) {
        let body = json!({
            "requests": [
                {
                    "repeatCell": {
                        "range": {
                            "sheetId": sheet_id,
                            "startRowIndex": 0,
                            "endRowIndex": 1,
                            "startColumnIndex": 0,
                            "endColumnIndex": COLUMN_COUNT,
                        },
                        "cell": {
                            "userEnteredFormat": {
                                "backgroundColor": {"red": 0.2, "green": 0.6, "blue": 0.9},
                                "textFormat": {
                                    "foregroundColor": {"red": 1.0, "green": 1.0, "blue": 1.0},
                                    "bold": true,
                                },
                                "horizontalAlignment": "CENTER",
                            }
                        },
                        "fields": "userEnteredFormat(backgroundColor,textFormat,horizontalAlignment)",
                    }
                },
                {
                    "autoResizeDimensions": {
                        "dimensions": {
                            "sheetId": sheet_id,
                            "dimension": "COLUMNS",
                            "startIndex": 0,
                            "endIndex": COLUMN_COUNT,
                        }
                    }
                }
            ]
        });

        let result = self
            .http
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Error formatting header row")
            }
            Err(e) => tracing::warn!(error = %e, "Error formatting header row"),
        }
    }

    async fn ensure_header_with(&self, token: &str) -> Result<(), StoreError> {
        if self.header_present(token).await? {
            return Ok(());
        }
        let sheet_id = self.write_header(token).await?;
        self.format_header(token, sheet_id).await;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for SheetsStore {
    async fn ensure_header(&self) -> Result<(), StoreError> {
        let token = self.auth.access_token(&self.http).await?;
        self.ensure_header_with(&token).await
    }

    async fn append_order(&self, record: &OrderRecord) -> Result<RecordHandle, StoreError> {
        let start = Instant::now();
        tracing::info!(
            order_id = %record.order_id,
            payment_status = %record.payment_status,
            total = %record.total_amount,
            "Saving order to sheet"
        );

        let token = self.auth.access_token(&self.http).await?;
        self.ensure_header_with(&token).await?;

        let response = self
            .http
            .post(self.values_url(&format!("{ORDERS_SHEET}!A:M:append")))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(&token)
            .json(&json!({ "values": [record.to_row()] }))
            .send()
            .await?;
        let response = check(response, StoreError::AppendFailed).await?;
        // The row is already written; an unreadable reply only loses the range
        let appended = match response.json::<AppendResponse>().await {
            Ok(appended) => appended,
            Err(e) => {
                tracing::warn!(order_id = %record.order_id, error = %e, "Unreadable append response");
                AppendResponse::default()
            }
        };

        metrics::record_sheets_operation("append", start.elapsed().as_secs_f64());

        Ok(RecordHandle {
            order_id: record.order_id.clone(),
            updated_range: appended.updates.and_then(|u| u.updated_range),
        })
    }

    async fn list_orders(&self) -> Result<Vec<StoredOrder>, StoreError> {
        let start = Instant::now();
        let token = self.auth.access_token(&self.http).await?;
        let value_range = self.read_range(&token, &format!("{ORDERS_SHEET}!A2:M")).await?;

        let mut orders: Vec<StoredOrder> = value_range
            .values
            .iter()
            .enumerate()
            .map(|(i, row)| StoredOrder {
                row: i + 1,
                record: OrderRecord::from_row(row),
            })
            .collect();
        orders.reverse();

        metrics::record_sheets_operation("list", start.elapsed().as_secs_f64());
        Ok(orders)
    }
}
