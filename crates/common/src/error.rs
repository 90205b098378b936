//! Common error types for conference controller components.

use thiserror::Error;

/// Errors raised while building or validating shared telephony types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Resource kind string is not one of the known kinds
    #[error("Unknown resource kind: {0}")]
    UnknownResourceKind(String),

    /// Resource key is missing required parts
    #[error("Invalid resource key: {0}")]
    InvalidKey(String),

    /// Origination descriptor failed boundary validation
    #[error("Invalid origination request: {0}")]
    InvalidOrigination(String),
}

/// Result type alias using `CommonError`
pub type Result<T> = std::result::Result<T, CommonError>;
