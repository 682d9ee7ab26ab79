//! Error handling for core value types

use thiserror::Error;

/// Errors raised while constructing core values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A tag must be exactly four ASCII bytes
    #[error("Invalid tag {text:?}: {reason}")]
    InvalidTag {
        text: String,
        reason: &'static str,
    },
}

/// Result type using the core Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid tag error
    pub fn invalid_tag(text: impl Into<String>, reason: &'static str) -> Self {
        Error::InvalidTag {
            text: text.into(),
            reason,
        }
    }
}
