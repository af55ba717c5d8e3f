//! Stream, intervention and cache settings.

use std::time::Duration;

use rafael_core::retry::BackoffPolicy;
use serde::{Deserialize, Serialize};

/// Event stream settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// Server origin hosting `/api/v1/runs/{id}/stream`.
    pub base_url: String,
    /// Reconnects allowed before the client gives up.
    pub max_reconnect_attempts: u32,
    /// First reconnect delay; doubles per attempt.
    pub reconnect_base_delay_ms: u64,
    /// Upper bound on a single reconnect delay.
    pub reconnect_max_delay_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3001".to_string(),
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60_000,
        }
    }
}

impl StreamSettings {
    /// Reconnect policy described by these settings.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_reconnect_attempts,
            base_delay_ms: self.reconnect_base_delay_ms,
            max_delay_ms: self.reconnect_max_delay_ms,
        }
    }
}

/// Human-in-the-loop settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterventionSettings {
    /// How long an intervention waits for an answer.
    pub default_timeout_ms: u64,
    /// Approve every intervention without asking.
    pub auto_approve: bool,
}

impl Default for InterventionSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            auto_approve: false,
        }
    }
}

impl InterventionSettings {
    /// Default timeout as a [`Duration`].
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Entry lifetime in minutes.
    pub ttl_minutes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_minutes: 10 }
    }
}

impl CacheSettings {
    /// Entry lifetime as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.saturating_mul(60))
    }
}
