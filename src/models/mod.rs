//! Data models representing database entities and API payloads.

/// Financial account model and verification status
pub mod account;
/// Ledger entry model, status lifecycle, and transfer requests
pub mod transaction;

/// A stored enum value that does not match any known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);
