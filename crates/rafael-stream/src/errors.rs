//! Transport error types.

use thiserror::Error;

/// Errors opening or reading a run's event stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be sent or the body failed mid-read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("stream endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// A non-HTTP source failed.
    #[error("stream source failed: {0}")]
    Source(String),
}

impl TransportError {
    /// Whether a later attempt could succeed. Authentication failures are
    /// still retried by the client up to its attempt budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Source(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }

    /// Error category string for event emission.
    pub fn category(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::Source(_) => "source",
        }
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
