//! Store error types.

use coinset_common::{CoinError, CoinId, ShortCode};
use thiserror::Error;

/// Errors raised by a coin store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id.
    #[error("Coin not found: {0}")]
    NotFound(CoinId),

    /// Another coin already holds this short code.
    #[error("Short code already in use: {0}")]
    DuplicateCode(ShortCode),

    /// The transaction could not commit because of a concurrent writer.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Check if retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::Unavailable(_))
    }
}

impl From<StoreError> for CoinError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoinError::NotFound(id.into()),
            StoreError::DuplicateCode(code) => {
                CoinError::invariant(format!("short code {code} is already in use"))
            }
            StoreError::Conflict(_) | StoreError::Unavailable(_) => {
                CoinError::TransactionFailure {
                    retryable: err.is_retryable(),
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
