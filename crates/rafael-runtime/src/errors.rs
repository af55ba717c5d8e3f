//! Runtime error types.

use rafael_actions::ExecutorError;
use rafael_core::ids::{InterventionId, SessionId};
use thiserror::Error;

use crate::interventions::InterventionStatus;

/// Failures calling the reasoning backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request could not be sent or the response body was unreadable.
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// A scripted backend ran out of responses.
    #[error("scripted backend exhausted after {calls} calls")]
    ScriptExhausted {
        /// Calls answered before running out.
        calls: usize,
    },

    /// The response did not have the expected shape.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::ScriptExhausted { .. } | Self::Malformed(_) => false,
        }
    }

    /// Error category string for event emission.
    pub fn category(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::ScriptExhausted { .. } => "script_exhausted",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Human-in-the-loop failures.
#[derive(Debug, Error)]
pub enum InterventionError {
    /// No intervention session exists for the browser session.
    #[error("no intervention session for {0}")]
    SessionNotFound(SessionId),

    /// Unknown intervention id.
    #[error("intervention not found: {0}")]
    NotFound(InterventionId),

    /// The intervention was already answered or expired.
    #[error("intervention {id} is already {status}")]
    NotPending {
        /// Intervention id.
        id: InterventionId,
        /// Its current status.
        status: InterventionStatus,
    },
}

impl InterventionError {
    /// Error category string for event emission.
    pub fn category(&self) -> &str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::NotFound(_) => "not_found",
            Self::NotPending { .. } => "not_pending",
        }
    }
}

/// Errors that stop a run.
///
/// Expected failures (nothing matched, low confidence, timeouts) end up in the
/// step history or the [`AgentResult`](rafael_core::agent::AgentResult), not here.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The reasoning backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The executor rejected a tool call.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// A terminal tool call carried malformed parameters.
    #[error("invalid parameters for {tool}: {source}")]
    InvalidParams {
        /// Tool whose parameters failed to decode.
        tool: String,
        /// Decoder message.
        #[source]
        source: serde_json::Error,
    },

    /// The intervention service refused a request.
    #[error("intervention error: {0}")]
    Intervention(#[from] InterventionError),
}

impl RuntimeError {
    /// Whether the run could be retried as-is.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_retryable(),
            Self::Executor(_) | Self::InvalidParams { .. } | Self::Intervention(_) => false,
        }
    }

    /// Error category string for event emission.
    pub fn category(&self) -> &str {
        match self {
            Self::Backend(_) => "backend",
            Self::Executor(_) | Self::InvalidParams { .. } => "invalid_params",
            Self::Intervention(_) => "intervention",
        }
    }
}

/// Reasons the launcher refuses a run request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaunchError {
    /// The app key header is missing or names no app.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    InvalidRequest(&'static str),
}

impl LaunchError {
    /// HTTP status the request layer should answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::InvalidRequest(_) => 400,
        }
    }

    /// Error category string for event emission.
    pub fn category(&self) -> &str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
