//! Error types and HTTP error response handling.
//!
//! This module defines every error the ledger can return and how each one is
//! converted into an HTTP response with a stable error code and JSON body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::transaction::TransactionStatus;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation Errors**: malformed input, rejected before any store call
/// - **Business Rule Errors**: insufficient funds, ineligible accounts, illegal status changes
/// - **Resource Errors**: referenced entry or account does not exist
/// - **Persistence Errors**: any `sqlx::Error`; always rolls back the enclosing scope
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request data is malformed (bad id, amount, or description).
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    Validation(String),

    /// Sender balance is below the requested amount.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// One of the parties is not allowed to take part in a transfer.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Account {account_id} is not eligible for transfers")]
    AccountIneligible { account_id: i64 },

    /// Referenced ledger entry or financial account does not exist.
    ///
    /// Returns HTTP 404 Not Found. The String names what was missing.
    #[error("{0} not found")]
    NotFound(String),

    /// Status change not permitted from the entry's current status.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Cannot move transaction from {from} to {to}")]
    InvalidStateTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Store-layer failure (connectivity, constraint violation).
    ///
    /// Returns HTTP 500. Driver detail is logged, never sent to the client.
    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InsufficientFunds => "insufficient_funds",
            AppError::AccountIneligible { .. } => "account_ineligible",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidStateTransition { .. } => "invalid_state_transition",
            AppError::Persistence(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientFunds | AppError::AccountIneligible { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "insufficient_funds",
///     "message": "Insufficient funds"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Persistence(err) => {
                tracing::error!(error = %err, "Persistence failure");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (self.status_code(), body).into_response()
    }
}
