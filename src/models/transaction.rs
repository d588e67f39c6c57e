//! Ledger entry data models and API request/response types.
//!
//! This module defines:
//! - `LedgerEntry`: one persisted row of `account_transactions` (one leg)
//! - `TransactionStatus`: the single status lifecycle shared by every entry
//! - `Posting` / `NewLedgerEntry`: write-side inputs for the ledger store
//! - Request types for transfers, standalone registrations, and status changes
//! - Response types returned to clients

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::UnknownVariant;

/// Longest description accepted on any ledger entry.
pub const MAX_DESCRIPTION_CHARS: usize = 255;

/// Largest absolute amount that fits the `NUMERIC(15, 2)` columns.
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999_999, 2)
}

/// Lifecycle status of a ledger entry.
///
/// Allowed transitions:
/// - Pending → Completed | Cancelled | Failed
/// - Failed | Reversed | OnHold → Cancelled
///
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Reversed,
    OnHold,
    Cancelled,
}

impl TransactionStatus {
    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Reversed => "reversed",
            Self::OnHold => "on_hold",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Pending, Self::Completed | Self::Cancelled | Self::Failed) => true,
            (Self::Failed | Self::Reversed | Self::OnHold, Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "reversed" => Ok(Self::Reversed),
            "on_hold" => Ok(Self::OnHold),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What a transaction group was allocated for.
///
/// A `Transfer` group holds exactly the two legs of one transfer. `Posting`
/// groups collect standalone registrations and may grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Transfer,
    Posting,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Posting => "posting",
        }
    }
}

impl FromStr for GroupKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(Self::Transfer),
            "posting" => Ok(Self::Posting),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Represents a ledger entry record from the database.
///
/// # Database Table
///
/// Maps to the `account_transactions` table. Each entry:
/// - Belongs to one transaction group (two entries per transfer)
/// - Records a signed amount (negative = debit, positive = credit)
/// - Snapshots the account balance after the amount was applied
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,

    #[sqlx(rename = "transaction_group_id")]
    pub group_id: i64,

    #[sqlx(rename = "financial_account_id")]
    pub account_id: i64,

    pub amount: Decimal,

    /// Invariant: `balance == previous balance + amount`
    pub balance: Decimal,

    pub description: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,

    pub created_at: DateTime<Utc>,

    /// Advances on every status change
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker; such entries are left out of history listings
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A row to be appended to the ledger.
///
/// `status` defaults to `Pending` when left unset.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub group_id: i64,
    pub account_id: i64,
    pub amount: Decimal,
    pub balance: Decimal,
    pub description: Option<String>,
    pub status: Option<TransactionStatus>,
}

/// Balance mutation request for `debit` / `credit`.
///
/// `amount` is always the positive magnitude; the store applies the sign.
/// The ledger row appended by the mutation carries the group, description
/// and status given here.
#[derive(Debug, Clone)]
pub struct Posting {
    pub group_id: i64,
    pub account_id: i64,
    pub amount: Decimal,
    pub description: Option<String>,
    pub status: Option<TransactionStatus>,
}

impl Posting {
    pub fn new(
        group_id: i64,
        account_id: i64,
        amount: Decimal,
        description: Option<String>,
    ) -> Self {
        Self {
            group_id,
            account_id,
            amount,
            description,
            status: None,
        }
    }

    /// Ledger row for this posting once the new balance is known.
    pub fn into_entry(self, signed_amount: Decimal, balance: Decimal) -> NewLedgerEntry {
        NewLedgerEntry {
            group_id: self.group_id,
            account_id: self.account_id,
            amount: signed_amount,
            balance,
            description: self.description,
            status: self.status,
        }
    }
}

/// Request to move money between two financial accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "sender_account_id": 1,
///   "receiver_account_id": 2,
///   "amount": "40.00",
///   "description": "rent"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub sender_account_id: i64,
    pub receiver_account_id: i64,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

impl TransferRequest {
    /// Validate the request shape. Never touches the store.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_id(self.sender_account_id, "sender account id")?;
        validate_id(self.receiver_account_id, "receiver account id")?;

        if self.sender_account_id == self.receiver_account_id {
            return Err(AppError::validation("Cannot transfer to the same account"));
        }

        if self.amount <= Decimal::ZERO {
            return Err(AppError::validation("Transfer amount must be positive"));
        }
        validate_amount_shape(self.amount)?;

        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_CHARS {
                return Err(AppError::validation(format!(
                    "Description must be at most {MAX_DESCRIPTION_CHARS} characters"
                )));
            }
        }

        Ok(())
    }

    /// Description as stored on both legs; an empty string counts as absent.
    pub fn leg_description(&self) -> Option<String> {
        self.description.clone().filter(|d| !d.is_empty())
    }
}

/// Request to register a standalone ledger posting (e.g. a fee).
///
/// A positive amount credits the account, a negative amount debits it.
/// When `group_id` is omitted a fresh transaction group is allocated.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterTransactionRequest {
    #[serde(default)]
    pub group_id: Option<i64>,
    pub account_id: i64,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

impl RegisterTransactionRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(group_id) = self.group_id {
            validate_id(group_id, "transaction group id")?;
        }
        validate_id(self.account_id, "account id")?;

        if self.amount.is_zero() {
            return Err(AppError::validation("Amount cannot be zero"));
        }
        validate_amount_shape(self.amount)?;

        if let Some(description) = &self.description {
            let len = description.chars().count();
            if len == 0 || len > MAX_DESCRIPTION_CHARS {
                return Err(AppError::validation(format!(
                    "Description must be between 1 and {MAX_DESCRIPTION_CHARS} characters"
                )));
            }
        }

        Ok(())
    }
}

/// Request body for `PUT /api/v1/transactions/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TransactionStatus,
}

pub fn validate_id(id: i64, what: &str) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::validation(format!("Invalid {what}")));
    }
    Ok(())
}

/// Range and precision checks shared by every amount the ledger accepts.
fn validate_amount_shape(amount: Decimal) -> Result<(), AppError> {
    if amount.abs() > max_amount() {
        return Err(AppError::validation("Amount out of range"));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::validation(
            "Amount can have at most 2 decimal places",
        ));
    }
    Ok(())
}

/// Response returned for a single ledger entry.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": 17,
///   "group_id": 9,
///   "account_id": 1,
///   "amount": "-40.00",
///   "balance": "60.00",
///   "description": "rent",
///   "status": "pending",
///   "created_at": "2025-12-21T16:00:00Z",
///   "updated_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub id: i64,
    pub group_id: i64,
    pub account_id: i64,
    pub amount: Decimal,
    pub balance: Decimal,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Drops the internal soft-delete marker.
impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            group_id: entry.group_id,
            account_id: entry.account_id,
            amount: entry.amount,
            balance: entry.balance,
            description: entry.description,
            status: entry.status,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// The two legs produced by one transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub group_id: i64,
    pub sender: LedgerEntry,
    pub receiver: LedgerEntry,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub group_id: i64,
    pub sender: LedgerEntryResponse,
    pub receiver: LedgerEntryResponse,
}

impl From<TransferReceipt> for TransferResponse {
    fn from(receipt: TransferReceipt) -> Self {
        Self {
            group_id: receipt.group_id,
            sender: receipt.sender.into(),
            receiver: receipt.receiver.into(),
        }
    }
}
