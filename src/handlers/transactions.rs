//! Transaction HTTP handlers.
//!
//! This module implements ledger-entry API endpoints:
//! - POST /api/v1/transactions/transfer - Move money between accounts
//! - POST /api/v1/transactions - Register a standalone posting
//! - GET /api/v1/transactions/{id} - Get ledger entry details
//! - DELETE /api/v1/transactions/{id} - Hard-delete a ledger entry
//! - POST /api/v1/transactions/{id}/cancel - Cancel a ledger entry
//! - PUT /api/v1/transactions/{id}/status - Guarded status change
//! - GET /api/v1/transaction-groups/{id}/transactions - Entries of one group

use crate::{
    error::AppError,
    models::transaction::{
        LedgerEntryResponse, RegisterTransactionRequest, TransferRequest, TransferResponse,
        UpdateStatusRequest,
    },
    services::{
        account_status::AccountStatusOracle, ledger_store::LedgerStore,
        transaction_service::SharedLedger,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Transfer money between accounts.
///
/// # Request Body
///
/// ```json
/// {
///   "sender_account_id": 1,
///   "receiver_account_id": 2,
///   "amount": "40.00",
///   "description": "rent"
/// }
/// ```
///
/// # Response (201)
///
/// Both legs and the group id they share.
///
/// # Atomicity
///
/// Both balances and both ledger rows are written in one database
/// transaction. Either everything is recorded or nothing is.
pub async fn create_transfer<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    let receipt = ledger.transfer(request).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Register a standalone posting (deposit, fee, adjustment).
///
/// Positive `amount` credits the account, negative debits it.
pub async fn register_transaction<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Json(request): Json<RegisterTransactionRequest>,
) -> Result<(StatusCode, Json<LedgerEntryResponse>), AppError> {
    let entry = ledger.register_transaction(request).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

pub async fn get_transaction<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(id): Path<i64>,
) -> Result<Json<LedgerEntryResponse>, AppError> {
    let entry = ledger.get_transaction(id).await?;
    Ok(Json(entry.into()))
}

/// Hard-delete a ledger entry.
///
/// # Response (204 No Content)
///
/// Balances are not adjusted.
pub async fn delete_transaction<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    ledger.delete_transaction(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cancel a ledger entry.
///
/// # Errors
///
/// - **404**: entry does not exist
/// - **409**: entry is already completed or cancelled
pub async fn cancel_transaction<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(id): Path<i64>,
) -> Result<Json<LedgerEntryResponse>, AppError> {
    let entry = ledger.cancel_transaction(id).await?;
    Ok(Json(entry.into()))
}

/// Move a ledger entry to a new status.
///
/// # Request Body
///
/// ```json
/// { "status": "completed" }
/// ```
pub async fn update_status<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<LedgerEntryResponse>, AppError> {
    let entry = ledger.transition_status(id, request.status).await?;
    Ok(Json(entry.into()))
}

/// List the entries of one transaction group, oldest first.
pub async fn list_group_transactions<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(group_id): Path<i64>,
) -> Result<Json<Vec<LedgerEntryResponse>>, AppError> {
    let entries = ledger.list_by_group(group_id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
