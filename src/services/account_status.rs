//! Account status oracle - reports whether an account may take part in a transfer.
//!
//! The oracle reads through the caller's scope, so a transfer needs exactly
//! one pooled connection and sees the same snapshot its row locks protect.

use async_trait::async_trait;

use super::ledger_store::{PgScope, account_not_found};
use crate::{error::AppError, models::account::AccountStatus};

#[async_trait]
pub trait AccountStatusOracle<Scope: Send + 'static>: Send + Sync + 'static {
    /// Fails with `NotFound` when the account does not exist.
    async fn account_status(
        &self,
        scope: &mut Scope,
        account_id: i64,
    ) -> Result<AccountStatus, AppError>;
}

/// Reads verification status from the `financial_accounts` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgAccountStatusOracle;

#[async_trait]
impl AccountStatusOracle<PgScope> for PgAccountStatusOracle {
    async fn account_status(
        &self,
        scope: &mut PgScope,
        account_id: i64,
    ) -> Result<AccountStatus, AppError> {
        let status: String =
            sqlx::query_scalar("SELECT status FROM financial_accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&mut **scope)
                .await?
                .ok_or_else(|| account_not_found(account_id))?;

        let status = AccountStatus::try_from(status)
            .map_err(|err| AppError::Persistence(sqlx::Error::Decode(Box::new(err))))?;

        tracing::debug!(account_id, %status, "Resolved account status");
        Ok(status)
    }
}
