//! Core error types.

use thiserror::Error;

/// Errors raised by identifier validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An agent name failed validation.
    #[error("invalid agent name {name:?}: {reason}")]
    InvalidAgentName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
