//! Error types for the core crate.

use thiserror::Error;

/// Errors raised while building core values from caller input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A model identifier did not follow the `provider:name` grammar.
    #[error("Invalid model identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The offending identifier.
        identifier: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An attachment could not be decoded.
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),
}

impl CoreError {
    /// Create an invalid identifier error.
    pub fn invalid_identifier(identifier: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason,
        }
    }

    /// Create an invalid attachment error.
    pub fn invalid_attachment(msg: impl Into<String>) -> Self {
        Self::InvalidAttachment(msg.into())
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
