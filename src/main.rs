//! Wallet Ledger Server - Main Application Entry Point
//!
//! A REST API server for a double-entry wallet ledger. It moves money between
//! financial accounts atomically, records every balance change as an
//! immutable ledger entry, and manages the status lifecycle of those entries.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries, row-level locks)
//! - **Money**: `rust_decimal` with two fractional digits
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Wire the ledger service over the Postgres store and status oracle
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use std::{sync::Arc, time::Duration};

use tracing_subscriber::EnvFilter;

use services::{
    account_status::PgAccountStatusOracle, ledger_store::PgLedgerStore,
    transaction_service::LedgerService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(
        &config.database_url,
        config.database_max_connections,
        Duration::from_secs(config.database_acquire_timeout_secs),
    )
    .await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Database pool created"
    );

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let ledger = Arc::new(LedgerService::new(PgLedgerStore::new(pool), PgAccountStatusOracle));

    let app = handlers::router(ledger);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
