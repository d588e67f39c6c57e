//! Financial account data models.
//!
//! The ledger only needs two things from an account: its authoritative
//! balance (mutated by the ledger store) and its verification status
//! (reported by the account status oracle).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::UnknownVariant;

/// Longest account name accepted.
pub const MAX_ACCOUNT_NAME_CHARS: usize = 255;

/// Verification status of a financial account.
///
/// Only `Verified` accounts may send or receive transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Verified,
    Unverified,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Unverified => "unverified",
        }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(Self::Verified),
            "unverified" => Ok(Self::Unverified),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl TryFrom<String> for AccountStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents a financial account record from the database.
///
/// # Database Table
///
/// Maps to the `financial_accounts` table. The `balance` column is the only
/// mutable state shared between concurrent transfers and is never cached.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FinancialAccount {
    pub id: i64,

    pub account_name: String,

    /// Must be >= 0 (enforced by database CHECK constraint)
    pub balance: Decimal,

    #[sqlx(try_from = "String")]
    pub status: AccountStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Request to open a financial account.
///
/// New accounts start `unverified` with a zero balance.
///
/// # JSON Example
///
/// ```json
/// { "account_name": "Household" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccountRequest {
    pub account_name: String,
}

impl OpenAccountRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let len = self.account_name.trim().chars().count();
        if len == 0 || self.account_name.chars().count() > MAX_ACCOUNT_NAME_CHARS {
            return Err(AppError::validation(format!(
                "Account name must be between 1 and {MAX_ACCOUNT_NAME_CHARS} characters"
            )));
        }
        Ok(())
    }
}

/// Response returned for a financial account.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub account_name: String,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FinancialAccount> for AccountResponse {
    fn from(account: FinancialAccount) -> Self {
        Self {
            id: account.id,
            account_name: account.account_name,
            balance: account.balance,
            status: account.status,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Response body for `GET /api/v1/accounts/{id}/balance`.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: i64,
    pub balance: Decimal,
}
