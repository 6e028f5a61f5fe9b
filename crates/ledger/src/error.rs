//! Ledger error types.

use thiserror::Error;

/// Ledger error type.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Award category is not one of the known categories.
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// Award amount must be a positive integer.
    #[error("Invalid amount: {0} (must be a positive integer)")]
    InvalidAmount(i64),

    /// Award name is missing or blank.
    #[error("Award name must not be empty")]
    EmptyName,

    /// Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic store failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl LedgerError {
    /// Whether this error is a rejected award rather than a storage failure.
    ///
    /// Validation errors never mutate the entry.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::UnknownCategory(_) | LedgerError::InvalidAmount(_) | LedgerError::EmptyName
        )
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
