//! Page model errors.

use thiserror::Error;

/// Errors raised by [`Document`](crate::Document) operations.
#[derive(Debug, Error)]
pub enum DomError {
    /// A URL could not be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The location cannot take the requested change.
    #[error("navigation to '{target}' failed: {reason}")]
    Navigation {
        /// Requested path or URL.
        target: String,
        /// Why it failed.
        reason: String,
    },
}

/// Result type for page model operations.
pub type Result<T> = std::result::Result<T, DomError>;
