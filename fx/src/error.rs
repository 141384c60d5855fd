//! Display-side error types.
//!
//! Conversion, formatting and resolution degrade instead of failing; only
//! capability wiring can error.

use thiserror::Error;

/// Errors raised while wiring or resolving capabilities.
#[derive(Debug, Error)]
pub enum FxError {
    /// A capability key was registered twice.
    #[error("Capability already registered: {0}")]
    DuplicateCapability(String),

    /// A capability value could not be encoded.
    #[error("Capability {key} could not be serialized: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for display-side operations.
pub type FxResult<T> = Result<T, FxError>;
