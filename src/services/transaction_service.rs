//! Transaction service - Core business logic for the wallet ledger.
//!
//! This service handles:
//! - Atomic two-leg transfers between financial accounts
//! - Standalone postings (fees, deposits) that share the same history
//! - The ledger entry status lifecycle (cancel and other guarded changes)
//! - Read access to entries, groups, account history, and balances
//! - Opening and verifying the financial accounts transfers run between
//!
//! # Atomicity Guarantees
//!
//! Every mutation runs inside one store scope. On success the scope is
//! committed; on any error it is rolled back and the original error is
//! returned. A rollback failure is logged, never surfaced in its place.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::{account_status::AccountStatusOracle, ledger_store::LedgerStore};
use crate::{
    error::AppError,
    models::{
        account::{AccountStatus, FinancialAccount, OpenAccountRequest},
        transaction::{
            GroupKind, LedgerEntry, Posting, RegisterTransactionRequest, TransactionStatus,
            TransferReceipt, TransferRequest, validate_id,
        },
    },
};

/// Ledger orchestrator over a store and an account status oracle.
pub struct LedgerService<S, O> {
    store: S,
    oracle: O,
}

/// Shared handle used as router state.
pub type SharedLedger<S, O> = Arc<LedgerService<S, O>>;

impl<S, O> LedgerService<S, O>
where
    S: LedgerStore,
    O: AccountStatusOracle<S::Scope>,
{
    pub fn new(store: S, oracle: O) -> Self {
        Self { store, oracle }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Move `amount` from sender to receiver.
    ///
    /// # Process
    ///
    /// 1. Validate the request (no scope is opened for bad input)
    /// 2. Open a scope and lock both balances in ascending account id order
    /// 3. Check sender funds, then the eligibility of both parties
    /// 4. Allocate a transaction group
    /// 5. Debit the sender, credit the receiver (one ledger row each)
    /// 6. Commit (or rollback on error)
    ///
    /// # Errors
    ///
    /// - `Validation`: malformed ids, amount, or description
    /// - `NotFound`: either account does not exist
    /// - `InsufficientFunds`: sender balance below amount
    /// - `AccountIneligible`: either party is unverified
    /// - `Persistence`: store failure; nothing is recorded
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, AppError> {
        request.validate()?;

        let mut scope = self.store.begin().await?;
        let result = self.transfer_in_scope(&mut scope, &request).await;
        let receipt = self.finish(scope, result).await?;

        tracing::info!(
            group_id = receipt.group_id,
            sender_account_id = request.sender_account_id,
            receiver_account_id = request.receiver_account_id,
            amount = %request.amount,
            "Transfer committed"
        );

        Ok(receipt)
    }

    async fn transfer_in_scope(
        &self,
        scope: &mut S::Scope,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, AppError> {
        let sender = request.sender_account_id;
        let receiver = request.receiver_account_id;
        let amount = request.amount;

        // Lock in ascending id order so opposing transfers cannot deadlock
        let sender_balance = if sender < receiver {
            let balance = self.store.current_balance(scope, sender).await?;
            self.store.current_balance(scope, receiver).await?;
            balance
        } else {
            self.store.current_balance(scope, receiver).await?;
            self.store.current_balance(scope, sender).await?
        };

        if sender_balance < amount {
            tracing::warn!(
                sender_account_id = sender,
                balance = %sender_balance,
                amount = %amount,
                "Transfer rejected: insufficient funds"
            );
            return Err(AppError::InsufficientFunds);
        }

        for account_id in [sender, receiver] {
            let status = self.oracle.account_status(scope, account_id).await?;
            if !status.is_eligible() {
                tracing::warn!(account_id, %status, "Transfer rejected: ineligible account");
                return Err(AppError::AccountIneligible { account_id });
            }
        }

        let group_id = self
            .store
            .new_transaction_group(scope, GroupKind::Transfer)
            .await?;
        tracing::debug!(group_id, "Allocated transaction group");

        let description = request.leg_description();
        let sender_leg = self
            .store
            .debit(scope, Posting::new(group_id, sender, amount, description.clone()))
            .await?;
        let receiver_leg = self
            .store
            .credit(scope, Posting::new(group_id, receiver, amount, description))
            .await?;

        Ok(TransferReceipt {
            group_id,
            sender: sender_leg,
            receiver: receiver_leg,
        })
    }

    /// Record a single posting against one account.
    ///
    /// A positive amount is a credit, a negative amount a debit. Without a
    /// `group_id` a fresh posting group is allocated in the same scope. A
    /// given `group_id` must name a posting group; transfer groups stay at
    /// their two legs.
    ///
    /// # Errors
    ///
    /// - `Validation`: bad ids, zero or out-of-range amount, bad description,
    ///   a transfer group, or a balance pushed out of range
    /// - `InsufficientFunds`: a debit larger than the balance
    /// - `NotFound`: unknown account or group
    /// - `Persistence`: store failure
    pub async fn register_transaction(
        &self,
        request: RegisterTransactionRequest,
    ) -> Result<LedgerEntry, AppError> {
        request.validate()?;

        let mut scope = self.store.begin().await?;
        let result = self.register_in_scope(&mut scope, request).await;
        let entry = self.finish(scope, result).await?;

        tracing::info!(
            entry_id = entry.id,
            group_id = entry.group_id,
            account_id = entry.account_id,
            amount = %entry.amount,
            "Transaction registered"
        );

        Ok(entry)
    }

    async fn register_in_scope(
        &self,
        scope: &mut S::Scope,
        request: RegisterTransactionRequest,
    ) -> Result<LedgerEntry, AppError> {
        let group_id = match request.group_id {
            Some(group_id) => {
                if self.store.group_kind(scope, group_id).await? == GroupKind::Transfer {
                    return Err(AppError::validation(format!(
                        "Transaction group {group_id} belongs to a transfer"
                    )));
                }
                group_id
            }
            None => {
                self.store
                    .new_transaction_group(scope, GroupKind::Posting)
                    .await?
            }
        };

        let posting = Posting::new(
            group_id,
            request.account_id,
            request.amount.abs(),
            request.description,
        );

        if request.amount > Decimal::ZERO {
            self.store.credit(scope, posting).await
        } else {
            self.store.debit(scope, posting).await
        }
    }

    /// Cancel a single ledger entry.
    ///
    /// Only the addressed leg changes; its pair in the group is untouched.
    pub async fn cancel_transaction(&self, id: i64) -> Result<LedgerEntry, AppError> {
        self.transition_status(id, TransactionStatus::Cancelled).await
    }

    /// Move an entry to `target` if its lifecycle allows it.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no entry with this id
    /// - `InvalidStateTransition`: the current status does not allow `target`
    pub async fn transition_status(
        &self,
        id: i64,
        target: TransactionStatus,
    ) -> Result<LedgerEntry, AppError> {
        validate_id(id, "transaction id")?;

        let mut scope = self.store.begin().await?;
        let result = self.transition_in_scope(&mut scope, id, target).await;
        let entry = self.finish(scope, result).await?;

        tracing::info!(entry_id = entry.id, status = %entry.status, "Transaction status changed");

        Ok(entry)
    }

    async fn transition_in_scope(
        &self,
        scope: &mut S::Scope,
        id: i64,
        target: TransactionStatus,
    ) -> Result<LedgerEntry, AppError> {
        let mut entry = self.store.get_by_id(scope, id).await?;

        if !entry.status.can_transition_to(target) {
            return Err(AppError::InvalidStateTransition {
                from: entry.status,
                to: target,
            });
        }

        entry.status = target;
        self.store.update(scope, &entry).await
    }

    /// Hard-delete an entry. Account balances are not adjusted.
    pub async fn delete_transaction(&self, id: i64) -> Result<(), AppError> {
        validate_id(id, "transaction id")?;

        let mut scope = self.store.begin().await?;
        let result = self.store.delete(&mut scope, id).await;
        self.finish(scope, result).await?;

        tracing::info!(entry_id = id, "Transaction deleted");
        Ok(())
    }

    pub async fn get_transaction(&self, id: i64) -> Result<LedgerEntry, AppError> {
        validate_id(id, "transaction id")?;
        self.store.find_by_id(id).await
    }

    /// Entries for an account, oldest first. Empty when there are none.
    pub async fn list_by_account(&self, account_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        validate_id(account_id, "account id")?;
        self.store.list_by_account(account_id).await
    }

    pub async fn list_by_group(&self, group_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        validate_id(group_id, "transaction group id")?;
        self.store.list_by_group(group_id).await
    }

    /// Like `list_by_account`, but an empty history is `NotFound`.
    pub async fn account_history(&self, account_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        let entries = self.list_by_account(account_id).await?;
        if entries.is_empty() {
            return Err(AppError::not_found(format!(
                "Transaction history for account {account_id}"
            )));
        }
        Ok(entries)
    }

    /// Authoritative balance, read in a short scope of its own.
    pub async fn account_balance(&self, account_id: i64) -> Result<Decimal, AppError> {
        validate_id(account_id, "account id")?;

        let mut scope = self.store.begin().await?;
        let result = self.store.current_balance(&mut scope, account_id).await;
        self.finish(scope, result).await
    }

    /// Open an `unverified` account with a zero balance.
    pub async fn open_account(
        &self,
        request: OpenAccountRequest,
    ) -> Result<FinancialAccount, AppError> {
        request.validate()?;

        let mut scope = self.store.begin().await?;
        let result = self.store.open_account(&mut scope, request.account_name).await;
        let account = self.finish(scope, result).await?;

        tracing::info!(account_id = account.id, "Financial account opened");
        Ok(account)
    }

    /// Mark an account `verified`. Verifying twice is a no-op.
    pub async fn verify_account(&self, account_id: i64) -> Result<FinancialAccount, AppError> {
        validate_id(account_id, "account id")?;

        let mut scope = self.store.begin().await?;
        let result = self.verify_in_scope(&mut scope, account_id).await;
        self.finish(scope, result).await
    }

    async fn verify_in_scope(
        &self,
        scope: &mut S::Scope,
        account_id: i64,
    ) -> Result<FinancialAccount, AppError> {
        let account = self.store.lock_account(scope, account_id).await?;

        if account.status == AccountStatus::Verified {
            tracing::info!(account_id, "Account already verified");
            return Ok(account);
        }

        let account = self
            .store
            .set_account_status(scope, account_id, AccountStatus::Verified)
            .await?;
        tracing::info!(account_id, "Financial account verified");
        Ok(account)
    }

    pub async fn get_account(&self, account_id: i64) -> Result<FinancialAccount, AppError> {
        validate_id(account_id, "account id")?;
        self.store.find_account(account_id).await
    }

    pub async fn health(&self) -> Result<(), AppError> {
        self.store.ping().await
    }

    /// Commit on success; roll back on failure and hand back the original error.
    async fn finish<T>(
        &self,
        scope: S::Scope,
        result: Result<T, AppError>,
    ) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                self.store.commit(scope).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback(scope).await {
                    tracing::error!(
                        error = %rollback_err,
                        original = %err,
                        "Rollback failed"
                    );
                }
                Err(err)
            }
        }
    }
}
