//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may name any subset of fields; missing ones keep their defaults.

mod agent;
mod transport;

pub use agent::*;
pub use transport::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "agent": { "maxSteps": 10 },
///   "stream": { "baseUrl": "https://rafael.example" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RafaelSettings {
    /// Orchestration loop limits and backend defaults.
    pub agent: AgentSettings,
    /// Semantic capture bounds.
    pub distiller: DistillerSettings,
    /// Action timing and gating.
    pub executor: ExecutorSettings,
    /// Event stream endpoint and reconnect policy.
    pub stream: StreamSettings,
    /// Human-in-the-loop defaults.
    pub interventions: InterventionSettings,
    /// Token cache lifetime.
    pub cache: CacheSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line instead of the compact format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
