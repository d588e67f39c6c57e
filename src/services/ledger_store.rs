//! Ledger store - persistence for ledger entries and atomic balance mutation.
//!
//! The `LedgerStore` trait is the contract the transfer orchestrator relies on.
//! Every mutating operation takes an open `Scope` (a database transaction for
//! the Postgres store); read-only lookups without a scope run in their own
//! implicit one.
//!
//! # Locking
//!
//! `current_balance`, `lock_account`, `debit` and `credit` take a row-level
//! lock on the account (`FOR UPDATE` / `UPDATE ... RETURNING`). Two scopes
//! touching the same account serialize in PostgreSQL, not in application code.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        account::{AccountStatus, FinancialAccount},
        transaction::{GroupKind, LedgerEntry, NewLedgerEntry, Posting},
    },
};

#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Unit of work: mutations inside it become visible together or not at all.
    type Scope: Send + 'static;

    async fn begin(&self) -> Result<Self::Scope, AppError>;

    async fn commit(&self, scope: Self::Scope) -> Result<(), AppError>;

    async fn rollback(&self, scope: Self::Scope) -> Result<(), AppError>;

    /// Append a ledger row. Status defaults to `Pending` when unset.
    async fn insert(
        &self,
        scope: &mut Self::Scope,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, AppError>;

    /// Fetch and lock an entry for a later `update`.
    async fn get_by_id(&self, scope: &mut Self::Scope, id: i64) -> Result<LedgerEntry, AppError>;

    /// Full-row update; advances `updated_at`.
    async fn update(
        &self,
        scope: &mut Self::Scope,
        entry: &LedgerEntry,
    ) -> Result<LedgerEntry, AppError>;

    /// Hard delete. Balances are left untouched.
    async fn delete(&self, scope: &mut Self::Scope, id: i64) -> Result<(), AppError>;

    /// Authoritative balance, locked for the rest of the scope.
    async fn current_balance(
        &self,
        scope: &mut Self::Scope,
        account_id: i64,
    ) -> Result<Decimal, AppError>;

    /// Remove `posting.amount` from the account and append the debit row.
    ///
    /// Fails with `InsufficientFunds` if the balance is below the amount.
    async fn debit(
        &self,
        scope: &mut Self::Scope,
        posting: Posting,
    ) -> Result<LedgerEntry, AppError>;

    /// Add `posting.amount` to the account and append the credit row.
    ///
    /// Fails with `Validation` if the new balance no longer fits the column.
    async fn credit(
        &self,
        scope: &mut Self::Scope,
        posting: Posting,
    ) -> Result<LedgerEntry, AppError>;

    /// Allocate a correlation id that is never handed out twice.
    async fn new_transaction_group(
        &self,
        scope: &mut Self::Scope,
        kind: GroupKind,
    ) -> Result<i64, AppError>;

    /// Kind of an existing group, locked for the rest of the scope.
    async fn group_kind(
        &self,
        scope: &mut Self::Scope,
        group_id: i64,
    ) -> Result<GroupKind, AppError>;

    /// Create an `unverified` account with a zero balance.
    async fn open_account(
        &self,
        scope: &mut Self::Scope,
        account_name: String,
    ) -> Result<FinancialAccount, AppError>;

    /// Fetch and lock an account row.
    async fn lock_account(
        &self,
        scope: &mut Self::Scope,
        account_id: i64,
    ) -> Result<FinancialAccount, AppError>;

    async fn set_account_status(
        &self,
        scope: &mut Self::Scope,
        account_id: i64,
        status: AccountStatus,
    ) -> Result<FinancialAccount, AppError>;

    async fn find_account(&self, account_id: i64) -> Result<FinancialAccount, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<LedgerEntry, AppError>;

    /// Entries for an account, oldest first. Soft-deleted rows are skipped.
    async fn list_by_account(&self, account_id: i64) -> Result<Vec<LedgerEntry>, AppError>;

    /// Entries sharing a group id, oldest first. Soft-deleted rows are skipped.
    async fn list_by_group(&self, group_id: i64) -> Result<Vec<LedgerEntry>, AppError>;

    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}

/// PostgreSQL-backed ledger store.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: DbPool,
}

/// Scope of the Postgres store: one database transaction.
pub type PgScope = Transaction<'static, Postgres>;

impl PgLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// SQLSTATE `numeric_value_out_of_range`
const NUMERIC_OUT_OF_RANGE: &str = "22003";

fn entry_not_found(id: i64) -> AppError {
    AppError::not_found(format!("Transaction {id}"))
}

pub(crate) fn account_not_found(account_id: i64) -> AppError {
    AppError::not_found(format!("Financial account {account_id}"))
}

/// A balance pushed past `NUMERIC(15, 2)` is a caller error, not a server fault.
fn balance_write_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) => {
            AppError::validation("Balance out of range")
        }
        _ => AppError::Persistence(err),
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Scope = PgScope;

    async fn begin(&self) -> Result<PgScope, AppError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, scope: PgScope) -> Result<(), AppError> {
        scope.commit().await?;
        Ok(())
    }

    async fn rollback(&self, scope: PgScope) -> Result<(), AppError> {
        scope.rollback().await?;
        Ok(())
    }

    async fn insert(
        &self,
        scope: &mut PgScope,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, AppError> {
        let status = entry.status.unwrap_or_default();

        let inserted = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO account_transactions (
                transaction_group_id,
                financial_account_id,
                amount,
                balance,
                description,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(entry.group_id)
        .bind(entry.account_id)
        .bind(entry.amount)
        .bind(entry.balance)
        .bind(entry.description)
        .bind(status.as_str())
        .fetch_one(&mut **scope)
        .await?;

        Ok(inserted)
    }

    async fn get_by_id(&self, scope: &mut PgScope, id: i64) -> Result<LedgerEntry, AppError> {
        sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM account_transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **scope)
        .await?
        .ok_or_else(|| entry_not_found(id))
    }

    async fn update(
        &self,
        scope: &mut PgScope,
        entry: &LedgerEntry,
    ) -> Result<LedgerEntry, AppError> {
        sqlx::query_as::<_, LedgerEntry>(
            r#"
            UPDATE account_transactions
            SET transaction_group_id = $2,
                financial_account_id = $3,
                amount = $4,
                balance = $5,
                description = $6,
                status = $7,
                deleted_at = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(entry.id)
        .bind(entry.group_id)
        .bind(entry.account_id)
        .bind(entry.amount)
        .bind(entry.balance)
        .bind(&entry.description)
        .bind(entry.status.as_str())
        .bind(entry.deleted_at)
        .fetch_optional(&mut **scope)
        .await?
        .ok_or_else(|| entry_not_found(entry.id))
    }

    async fn delete(&self, scope: &mut PgScope, id: i64) -> Result<(), AppError> {
        let deleted = sqlx::query("DELETE FROM account_transactions WHERE id = $1")
            .bind(id)
            .execute(&mut **scope)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(entry_not_found(id));
        }

        Ok(())
    }

    async fn current_balance(
        &self,
        scope: &mut PgScope,
        account_id: i64,
    ) -> Result<Decimal, AppError> {
        // FOR UPDATE holds the row until the scope ends
        sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM financial_accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(account_id)
        .fetch_optional(&mut **scope)
        .await?
        .ok_or_else(|| account_not_found(account_id))
    }

    async fn debit(&self, scope: &mut PgScope, posting: Posting) -> Result<LedgerEntry, AppError> {
        let balance = self.current_balance(scope, posting.account_id).await?;

        if balance < posting.amount {
            return Err(AppError::InsufficientFunds);
        }

        let new_balance: Decimal = sqlx::query_scalar(
            r#"
            UPDATE financial_accounts
            SET balance = balance - $1,
                updated_at = NOW()
            WHERE id = $2
            RETURNING balance
            "#,
        )
        .bind(posting.amount)
        .bind(posting.account_id)
        .fetch_one(&mut **scope)
        .await?;

        let amount = -posting.amount;
        self.insert(scope, posting.into_entry(amount, new_balance)).await
    }

    async fn credit(&self, scope: &mut PgScope, posting: Posting) -> Result<LedgerEntry, AppError> {
        // UPDATE takes the row lock itself, so no separate read is needed
        let new_balance: Decimal = sqlx::query_scalar(
            r#"
            UPDATE financial_accounts
            SET balance = balance + $1,
                updated_at = NOW()
            WHERE id = $2
            RETURNING balance
            "#,
        )
        .bind(posting.amount)
        .bind(posting.account_id)
        .fetch_optional(&mut **scope)
        .await
        .map_err(balance_write_error)?
        .ok_or_else(|| account_not_found(posting.account_id))?;

        let amount = posting.amount;
        self.insert(scope, posting.into_entry(amount, new_balance)).await
    }

    async fn new_transaction_group(
        &self,
        scope: &mut PgScope,
        kind: GroupKind,
    ) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO transaction_groups (kind) VALUES ($1) RETURNING id",
        )
        .bind(kind.as_str())
        .fetch_one(&mut **scope)
        .await?;

        Ok(id)
    }

    async fn group_kind(&self, scope: &mut PgScope, group_id: i64) -> Result<GroupKind, AppError> {
        let kind: String =
            sqlx::query_scalar("SELECT kind FROM transaction_groups WHERE id = $1 FOR UPDATE")
                .bind(group_id)
                .fetch_optional(&mut **scope)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Transaction group {group_id}")))?;

        kind.parse().map_err(|err| AppError::Persistence(sqlx::Error::Decode(Box::new(err))))
    }

    async fn open_account(
        &self,
        scope: &mut PgScope,
        account_name: String,
    ) -> Result<FinancialAccount, AppError> {
        let account = sqlx::query_as::<_, FinancialAccount>(
            r#"
            INSERT INTO financial_accounts (account_name, status)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(account_name)
        .bind(AccountStatus::Unverified.as_str())
        .fetch_one(&mut **scope)
        .await?;

        Ok(account)
    }

    async fn lock_account(
        &self,
        scope: &mut PgScope,
        account_id: i64,
    ) -> Result<FinancialAccount, AppError> {
        sqlx::query_as::<_, FinancialAccount>(
            "SELECT * FROM financial_accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(account_id)
        .fetch_optional(&mut **scope)
        .await?
        .ok_or_else(|| account_not_found(account_id))
    }

    async fn set_account_status(
        &self,
        scope: &mut PgScope,
        account_id: i64,
        status: AccountStatus,
    ) -> Result<FinancialAccount, AppError> {
        sqlx::query_as::<_, FinancialAccount>(
            r#"
            UPDATE financial_accounts
            SET status = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(status.as_str())
        .fetch_optional(&mut **scope)
        .await?
        .ok_or_else(|| account_not_found(account_id))
    }

    async fn find_account(&self, account_id: i64) -> Result<FinancialAccount, AppError> {
        sqlx::query_as::<_, FinancialAccount>("SELECT * FROM financial_accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| account_not_found(account_id))
    }

    async fn find_by_id(&self, id: i64) -> Result<LedgerEntry, AppError> {
        sqlx::query_as::<_, LedgerEntry>("SELECT * FROM account_transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| entry_not_found(id))
    }

    async fn list_by_account(&self, account_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT * FROM account_transactions
            WHERE financial_account_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_by_group(&self, group_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT * FROM account_transactions
            WHERE transaction_group_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
