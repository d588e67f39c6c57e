//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params)
//! 2. Delegates to the ledger service
//! 3. Returns HTTP response (JSON, status code)
//!
//! Handlers are generic over the ledger store and status oracle, so the same
//! router serves PostgreSQL in production and the in-memory store in tests.

/// Account lifecycle, listings and balance
pub mod accounts;
/// Service health
pub mod health;
/// Transfers and ledger entry lifecycle
pub mod transactions;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::services::{
    account_status::AccountStatusOracle, ledger_store::LedgerStore,
    transaction_service::SharedLedger,
};

/// Build the application router with all ledger routes.
pub fn router<S, O>(ledger: SharedLedger<S, O>) -> Router
where
    S: LedgerStore,
    O: AccountStatusOracle<S::Scope>,
{
    Router::new()
        .route("/health", get(health::health_check::<S, O>))
        // Transaction routes
        .route(
            "/api/v1/transactions/transfer",
            post(transactions::create_transfer::<S, O>),
        )
        .route(
            "/api/v1/transactions",
            post(transactions::register_transaction::<S, O>),
        )
        .route(
            "/api/v1/transactions/{id}",
            get(transactions::get_transaction::<S, O>)
                .delete(transactions::delete_transaction::<S, O>),
        )
        .route(
            "/api/v1/transactions/{id}/cancel",
            post(transactions::cancel_transaction::<S, O>),
        )
        .route(
            "/api/v1/transactions/{id}/status",
            put(transactions::update_status::<S, O>),
        )
        .route(
            "/api/v1/transaction-groups/{id}/transactions",
            get(transactions::list_group_transactions::<S, O>),
        )
        // Account routes
        .route("/api/v1/accounts", post(accounts::open_account::<S, O>))
        .route("/api/v1/accounts/{id}", get(accounts::get_account::<S, O>))
        .route(
            "/api/v1/accounts/{id}/verify",
            post(accounts::verify_account::<S, O>),
        )
        .route(
            "/api/v1/accounts/{id}/transactions",
            get(accounts::list_account_transactions::<S, O>),
        )
        .route(
            "/api/v1/accounts/{id}/history",
            get(accounts::account_history::<S, O>),
        )
        .route(
            "/api/v1/accounts/{id}/balance",
            get(accounts::get_balance::<S, O>),
        )
        // Request/response tracing
        .layer(TraceLayer::new_for_http())
        .with_state(ledger)
}
