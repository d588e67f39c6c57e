//! Health check endpoint for service monitoring.

use crate::{
    error::AppError,
    services::{
        account_status::AccountStatusOracle, ledger_store::LedgerStore,
        transaction_service::SharedLedger,
    },
};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
///
/// Returns service status and database connectivity.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Database connection status
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// If the ledger store is unreachable, returns the standard error response.
pub async fn health_check<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
) -> Result<Json<HealthResponse>, AppError> {
    ledger.health().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        database: "connected".to_string(),
        timestamp: Utc::now(),
    }))
}
