//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Posting amount was zero or negative
    #[error("Amount must be positive")]
    ZeroAmount,

    /// Posting currency differs from the demobank currency
    #[error("Bad currency: expected {expected}, got {got}")]
    BadCurrency {
        /// Currency configured on the demobank
        expected: String,
        /// Currency carried by the request
        got: String,
    },

    /// Debit would exceed the configured debt limit
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violated
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Serializable transaction kept conflicting after all retries
    #[error("Serialization conflict, transaction aborted")]
    SerializationConflict,

    /// Malformed monetary amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broken internal invariant (corrupt store)
    #[error("Invariant violation: {0}")]
    Invariant(String),
}
