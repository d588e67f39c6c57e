//! Account-scoped ledger HTTP handlers.
//!
//! This module implements the financial account endpoints:
//! - POST /api/v1/accounts - Open an unverified account
//! - GET /api/v1/accounts/{id} - Account details
//! - POST /api/v1/accounts/{id}/verify - Mark an account verified
//! - GET /api/v1/accounts/{id}/transactions - Ledger entries (may be empty)
//! - GET /api/v1/accounts/{id}/history - Ledger entries (404 when empty)
//! - GET /api/v1/accounts/{id}/balance - Authoritative balance

use crate::{
    error::AppError,
    models::{
        account::{AccountResponse, BalanceResponse, OpenAccountRequest},
        transaction::LedgerEntryResponse,
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

/// Open a financial account.
///
/// # Request Body
///
/// ```json
/// { "account_name": "household" }
/// ```
///
/// # Response (201)
///
/// The new account with a `0.00` balance and status `unverified`.
pub async fn open_account<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let account = ledger.open_account(request).await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

pub async fn get_account<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(account_id): Path<i64>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = ledger.get_account(account_id).await?;
    Ok(Json(account.into()))
}

/// Verify an account so it may take part in transfers.
///
/// Verifying an already verified account returns it unchanged.
pub async fn verify_account<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(account_id): Path<i64>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = ledger.verify_account(account_id).await?;
    Ok(Json(account.into()))
}

/// List an account's ledger entries, oldest first.
///
/// # Response (200)
///
/// A JSON array; `[]` when the account has no entries.
pub async fn list_account_transactions<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(account_id): Path<i64>,
) -> Result<Json<Vec<LedgerEntryResponse>>, AppError> {
    let entries = ledger.list_by_account(account_id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Account transaction history.
///
/// Same as the listing above, except an account with no entries answers 404.
pub async fn account_history<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(account_id): Path<i64>,
) -> Result<Json<Vec<LedgerEntryResponse>>, AppError> {
    let entries = ledger.account_history(account_id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Current balance of an account.
///
/// # Response (200)
///
/// ```json
/// { "account_id": 1, "balance": "60.00" }
/// ```
pub async fn get_balance<S: LedgerStore, O: AccountStatusOracle<S::Scope>>(
    State(ledger): State<SharedLedger<S, O>>,
    Path(account_id): Path<i64>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = ledger.account_balance(account_id).await?;
    Ok(Json(BalanceResponse {
        account_id,
        balance,
    }))
}
