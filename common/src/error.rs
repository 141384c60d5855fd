//! Error types for coin operations.

use std::fmt;

use thiserror::Error;

use crate::identifiers::{CoinId, ShortCode};

/// How a coin was referenced by a failed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoinRef {
    Id(CoinId),
    Code(ShortCode),
}

impl fmt::Display for CoinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinRef::Id(id) => write!(f, "id {id}"),
            CoinRef::Code(code) => write!(f, "code {code}"),
        }
    }
}

impl From<CoinId> for CoinRef {
    fn from(id: CoinId) -> Self {
        CoinRef::Id(id)
    }
}

impl From<ShortCode> for CoinRef {
    fn from(code: ShortCode) -> Self {
        CoinRef::Code(code)
    }
}

/// Main error type for coin administration.
///
/// Display paths (conversion, formatting, resolution) never return these;
/// they degrade instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinError {
    /// Referenced coin does not exist.
    #[error("Coin not found: {0}")]
    NotFound(CoinRef),

    /// A field failed validation.
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// The operation would break a coin-set invariant.
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// The store could not commit the unit of work.
    #[error("Transaction failed: {message}")]
    TransactionFailure { message: String, retryable: bool },
}

impl CoinError {
    /// Build an input validation error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoinError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        CoinError::InvariantViolation {
            message: message.into(),
        }
    }

    /// Field that caused rejection (if applicable).
    pub fn field(&self) -> Option<&str> {
        match self {
            CoinError::InvalidInput { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Check if this is a validation-class error.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoinError::InvalidInput { .. } | CoinError::InvariantViolation { .. }
        )
    }

    /// Check if the caller may retry. The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoinError::TransactionFailure {
                retryable: true,
                ..
            }
        )
    }

    /// Get error code for adapters.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoinError::NotFound(_) => "COIN_NOT_FOUND",
            CoinError::InvalidInput { .. } => "INVALID_INPUT",
            CoinError::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            CoinError::TransactionFailure { .. } => "TRANSACTION_FAILURE",
        }
    }
}

/// Result type alias for coin operations.
pub type Result<T> = std::result::Result<T, CoinError>;
