//! Executor error types.
//!
//! Only faults that mean the caller handed over something unusable are errors.
//! A missing element, a low confidence score or a timeout is an
//! [`ActionResult`](rafael_core::tools::ActionResult) with `success: false`.

use thiserror::Error;

/// Hard failures from [`ActionExecutor`](crate::ActionExecutor).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A parameter was present with the wrong JSON type.
    #[error("invalid parameters for {tool}: {source}")]
    InvalidParams {
        /// Tool whose parameters failed to decode.
        tool: String,
        /// Decoder message.
        #[source]
        source: serde_json::Error,
    },
}

impl ExecutorError {
    /// Error category string for event emission.
    pub fn category(&self) -> &str {
        match self {
            Self::InvalidParams { .. } => "invalid_params",
        }
    }
}

/// Result type for executor operations.
pub type Result<T> = std::result::Result<T, ExecutorError>;
