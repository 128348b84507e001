// =============================================================================
// ERROR MODULE
// =============================================================================
// The HTTP boundary's error type. Component errors (validation, payment,
// store, pipeline) convert into `AppError`, which decides the status code
// and the `{error, details?}` body.
//
// 500s never carry internal detail to the caller; the detail goes to the
// log instead.
// =============================================================================

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::payment::PaymentError;
use crate::pipeline::SubmitError;
use crate::store::StoreError;
use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    // -------------------------------------------------------------------------
    // CLIENT ERRORS
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // COLLABORATOR ERRORS
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Persisting a submitted order failed; the order is lost
    #[error("Order not saved: {0}")]
    OrderNotSaved(StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Order sheet not configured")]
    StoreNotConfigured,

    // -------------------------------------------------------------------------
    // INTERNAL ERRORS
    // -------------------------------------------------------------------------
    #[error("Internal error: {0}")]
    Internal(String),
}

pub const ORDER_NOT_SAVED_MESSAGE: &str =
    "Failed to save order. Please try again or call us to place your order.";

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        self.status_and_body().0
    }

    fn status_and_body(&self) -> (StatusCode, ErrorResponse) {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_details(errors.to_string(), json!(errors.fields())),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, ErrorResponse::new("Unauthorized")),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg.clone())),

            AppError::Payment(e) => match e {
                PaymentError::ProductNotFound(_)
                | PaymentError::InvalidAmount(_)
                | PaymentError::SignatureInvalid
                | PaymentError::MalformedEvent(_) => {
                    (StatusCode::BAD_REQUEST, ErrorResponse::new(e.to_string()))
                }
                // The gateway's own reason is meant for the customer
                PaymentError::Gateway(reason) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(reason.clone()),
                ),
                PaymentError::NotConfigured => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(e.to_string()),
                ),
                PaymentError::Transport(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Payment service unavailable"),
                ),
            },

            AppError::OrderNotSaved(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(ORDER_NOT_SAVED_MESSAGE),
            ),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Failed to fetch orders"),
            ),
            AppError::StoreNotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(self.to_string()),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Internal server error"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(errors) => AppError::Validation(errors),
            SubmitError::ProductNotFound(_) | SubmitError::PaymentNotCompleted => {
                AppError::BadRequest(err.to_string())
            }
            SubmitError::Payment(e) => AppError::Payment(e),
            SubmitError::Persistence(e) => AppError::OrderNotSaved(e),
        }
    }
}

/// Malformed JSON is a 400 like any other bad input, not axum's 422.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
