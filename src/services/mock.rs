//! In-memory ledger store and status oracle for service and handler tests.
//!
//! A scope holds the state lock for its whole lifetime and works on a copy,
//! so commit publishes everything at once and rollback simply drops the copy.
//! Entry and group ids come from counters outside the copy and are never
//! reused after a rollback.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::account_status::AccountStatusOracle;
use super::ledger_store::{LedgerStore, account_not_found};
use crate::{
    error::AppError,
    models::{
        account::{AccountStatus, FinancialAccount},
        transaction::{GroupKind, LedgerEntry, NewLedgerEntry, Posting, max_amount},
    },
};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<i64, FinancialAccount>,
    entries: BTreeMap<i64, LedgerEntry>,
    groups: BTreeMap<i64, GroupKind>,
}

impl LedgerState {
    fn account(&self, account_id: i64) -> Result<&FinancialAccount, AppError> {
        self.accounts
            .get(&account_id)
            .ok_or_else(|| account_not_found(account_id))
    }

    fn account_mut(&mut self, account_id: i64) -> Result<&mut FinancialAccount, AppError> {
        self.accounts
            .get_mut(&account_id)
            .ok_or_else(|| account_not_found(account_id))
    }

    fn listed<F>(&self, keep: F) -> Vec<LedgerEntry>
    where
        F: Fn(&LedgerEntry) -> bool,
    {
        let mut entries: Vec<LedgerEntry> = self
            .entries
            .values()
            .filter(|e| e.deleted_at.is_none() && keep(e))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.id));
        entries
    }
}

pub struct MemoryScope {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

pub struct MemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    next_entry_id: AtomicI64,
    next_group_id: AtomicI64,
    begin_count: AtomicUsize,
    rollback_count: AtomicUsize,
    fail_credit: AtomicBool,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            next_entry_id: AtomicI64::new(1),
            next_group_id: AtomicI64::new(1),
            begin_count: AtomicUsize::new(0),
            rollback_count: AtomicUsize::new(0),
            fail_credit: AtomicBool::new(false),
        }
    }

    /// Create an account with a fixed id and a zero balance.
    pub async fn seed_account(&self, account_id: i64, status: AccountStatus) {
        let now = Utc::now();
        self.state.lock().await.accounts.insert(
            account_id,
            FinancialAccount {
                id: account_id,
                account_name: format!("account {account_id}"),
                balance: Decimal::ZERO,
                status,
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// Make every `credit` fail with a persistence error.
    pub fn set_fail_credit(&self, fail: bool) {
        self.fail_credit.store(fail, Ordering::SeqCst);
    }

    pub async fn balance(&self, account_id: i64) -> Option<Decimal> {
        self.state
            .lock()
            .await
            .accounts
            .get(&account_id)
            .map(|a| a.balance)
    }

    pub async fn total_balance(&self) -> Decimal {
        self.state
            .lock()
            .await
            .accounts
            .values()
            .map(|a| a.balance)
            .sum()
    }

    pub async fn entry_count(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn soft_delete(&self, id: i64) {
        if let Some(entry) = self.state.lock().await.entries.get_mut(&id) {
            entry.deleted_at = Some(Utc::now());
        }
    }

    pub fn begin_count(&self) -> usize {
        self.begin_count.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollback_count.load(Ordering::SeqCst)
    }

    /// Highest group id handed out so far (0 if none).
    pub fn last_group_id(&self) -> i64 {
        self.next_group_id.load(Ordering::SeqCst) - 1
    }

    /// Write a new balance, rejecting values the real column cannot hold.
    fn write_balance(
        scope: &mut MemoryScope,
        account_id: i64,
        balance: Decimal,
    ) -> Result<(), AppError> {
        if balance > max_amount() {
            return Err(AppError::validation("Balance out of range"));
        }
        let account = scope.working.account_mut(account_id)?;
        account.balance = balance;
        account.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Scope = MemoryScope;

    async fn begin(&self) -> Result<MemoryScope, AppError> {
        self.begin_count.fetch_add(1, Ordering::SeqCst);
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryScope { guard, working })
    }

    async fn commit(&self, scope: MemoryScope) -> Result<(), AppError> {
        let MemoryScope { mut guard, working } = scope;
        *guard = working;
        Ok(())
    }

    async fn rollback(&self, _scope: MemoryScope) -> Result<(), AppError> {
        self.rollback_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert(
        &self,
        scope: &mut MemoryScope,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, AppError> {
        // Mirror the foreign keys of the real schema
        if !scope.working.groups.contains_key(&entry.group_id) {
            return Err(AppError::Persistence(sqlx::Error::Protocol(format!(
                "foreign key violation: transaction group {}",
                entry.group_id
            ))));
        }
        scope.working.account(entry.account_id)?;

        let now = Utc::now();
        let stored = LedgerEntry {
            id: self.next_entry_id.fetch_add(1, Ordering::SeqCst),
            group_id: entry.group_id,
            account_id: entry.account_id,
            amount: entry.amount,
            balance: entry.balance,
            description: entry.description,
            status: entry.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        scope.working.entries.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, scope: &mut MemoryScope, id: i64) -> Result<LedgerEntry, AppError> {
        scope
            .working
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Transaction {id}")))
    }

    async fn update(
        &self,
        scope: &mut MemoryScope,
        entry: &LedgerEntry,
    ) -> Result<LedgerEntry, AppError> {
        let stored = scope
            .working
            .entries
            .get_mut(&entry.id)
            .ok_or_else(|| AppError::not_found(format!("Transaction {}", entry.id)))?;

        let created_at = stored.created_at;
        *stored = entry.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now().max(entry.updated_at);
        Ok(stored.clone())
    }

    async fn delete(&self, scope: &mut MemoryScope, id: i64) -> Result<(), AppError> {
        scope
            .working
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(format!("Transaction {id}")))
    }

    async fn current_balance(
        &self,
        scope: &mut MemoryScope,
        account_id: i64,
    ) -> Result<Decimal, AppError> {
        Ok(scope.working.account(account_id)?.balance)
    }

    async fn debit(
        &self,
        scope: &mut MemoryScope,
        posting: Posting,
    ) -> Result<LedgerEntry, AppError> {
        let balance = scope.working.account(posting.account_id)?.balance;
        if balance < posting.amount {
            return Err(AppError::InsufficientFunds);
        }

        let new_balance = balance - posting.amount;
        Self::write_balance(scope, posting.account_id, new_balance)?;

        let amount = -posting.amount;
        self.insert(scope, posting.into_entry(amount, new_balance)).await
    }

    async fn credit(
        &self,
        scope: &mut MemoryScope,
        posting: Posting,
    ) -> Result<LedgerEntry, AppError> {
        if self.fail_credit.load(Ordering::SeqCst) {
            return Err(AppError::Persistence(sqlx::Error::PoolTimedOut));
        }

        let balance = scope.working.account(posting.account_id)?.balance;
        let new_balance = balance + posting.amount;
        Self::write_balance(scope, posting.account_id, new_balance)?;

        let amount = posting.amount;
        self.insert(scope, posting.into_entry(amount, new_balance)).await
    }

    async fn new_transaction_group(
        &self,
        scope: &mut MemoryScope,
        kind: GroupKind,
    ) -> Result<i64, AppError> {
        let id = self.next_group_id.fetch_add(1, Ordering::SeqCst);
        scope.working.groups.insert(id, kind);
        Ok(id)
    }

    async fn group_kind(
        &self,
        scope: &mut MemoryScope,
        group_id: i64,
    ) -> Result<GroupKind, AppError> {
        scope
            .working
            .groups
            .get(&group_id)
            .copied()
            .ok_or_else(|| AppError::not_found(format!("Transaction group {group_id}")))
    }

    async fn open_account(
        &self,
        scope: &mut MemoryScope,
        account_name: String,
    ) -> Result<FinancialAccount, AppError> {
        let id = scope.working.accounts.keys().max().map_or(1, |id| id + 1);
        let now = Utc::now();
        let account = FinancialAccount {
            id,
            account_name,
            balance: Decimal::new(0, 2),
            status: AccountStatus::Unverified,
            created_at: now,
            updated_at: now,
        };
        scope.working.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn lock_account(
        &self,
        scope: &mut MemoryScope,
        account_id: i64,
    ) -> Result<FinancialAccount, AppError> {
        scope.working.account(account_id).cloned()
    }

    async fn set_account_status(
        &self,
        scope: &mut MemoryScope,
        account_id: i64,
        status: AccountStatus,
    ) -> Result<FinancialAccount, AppError> {
        let account = scope.working.account_mut(account_id)?;
        account.status = status;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn find_account(&self, account_id: i64) -> Result<FinancialAccount, AppError> {
        self.state.lock().await.account(account_id).cloned()
    }

    async fn find_by_id(&self, id: i64) -> Result<LedgerEntry, AppError> {
        self.state
            .lock()
            .await
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Transaction {id}")))
    }

    async fn list_by_account(&self, account_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        let state = self.state.lock().await;
        Ok(state.listed(|e| e.account_id == account_id))
    }

    async fn list_by_group(&self, group_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
        let state = self.state.lock().await;
        Ok(state.listed(|e| e.group_id == group_id))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Status oracle that reads account rows through the memory scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStatusOracle;

#[async_trait]
impl AccountStatusOracle<MemoryScope> for MemoryStatusOracle {
    async fn account_status(
        &self,
        scope: &mut MemoryScope,
        account_id: i64,
    ) -> Result<AccountStatus, AppError> {
        Ok(scope.working.account(account_id)?.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn rollback_discards_scope_changes() {
        let store = MemoryLedgerStore::new();
        store.seed_account(1, AccountStatus::Verified).await;

        let mut scope = store.begin().await.unwrap();
        let group = store
            .new_transaction_group(&mut scope, GroupKind::Posting)
            .await
            .unwrap();
        store
            .credit(&mut scope, Posting::new(group, 1, dec!(10.00), None))
            .await
            .unwrap();
        store.rollback(scope).await.unwrap();

        assert_eq!(store.balance(1).await, Some(dec!(0)));
        assert_eq!(store.entry_count().await, 0);
        assert_eq!(store.last_group_id(), group);
    }

    #[tokio::test]
    async fn insert_requires_an_allocated_group() {
        let store = MemoryLedgerStore::new();
        store.seed_account(1, AccountStatus::Verified).await;

        let mut scope = store.begin().await.unwrap();
        let result = store
            .credit(&mut scope, Posting::new(42, 1, dec!(1.00), None))
            .await;

        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[tokio::test]
    async fn oracle_sees_uncommitted_status() {
        let store = MemoryLedgerStore::new();

        let mut scope = store.begin().await.unwrap();
        let account = store
            .open_account(&mut scope, "pending review".to_string())
            .await
            .unwrap();
        store
            .set_account_status(&mut scope, account.id, AccountStatus::Verified)
            .await
            .unwrap();

        assert_eq!(
            MemoryStatusOracle
                .account_status(&mut scope, account.id)
                .await
                .unwrap(),
            AccountStatus::Verified
        );
    }
}
