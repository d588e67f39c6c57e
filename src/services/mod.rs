//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! The ledger store and account status oracle are traits so the transfer
//! orchestrator can run against PostgreSQL in production and in memory in tests.

pub mod account_status;
pub mod ledger_store;
#[cfg(test)]
pub mod mock;
pub mod transaction_service;
