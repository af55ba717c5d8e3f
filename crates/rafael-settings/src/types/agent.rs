//! Agent loop, distiller and executor settings.

use rafael_core::routing::ModelVariant;
use serde::{Deserialize, Serialize};

/// Orchestration loop settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Backend variant used when routing has no preference.
    pub model: ModelVariant,
    /// Completion budget per backend call.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Hard bound on backend calls per run.
    pub max_steps: u32,
    /// Steps below this confidence stop the run.
    pub confidence_threshold: f64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: ModelVariant::ClaudeSonnet,
            max_tokens: 4096,
            temperature: 0.7,
            max_steps: 25,
            confidence_threshold: 0.7,
        }
    }
}

/// Semantic capture settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistillerSettings {
    /// Maximum elements in one tree.
    pub max_elements: usize,
    /// Maximum elements rendered into a prompt.
    pub prompt_elements: usize,
}

impl Default for DistillerSettings {
    fn default() -> Self {
        Self {
            max_elements: 200,
            prompt_elements: 50,
        }
    }
}

/// Action executor settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorSettings {
    /// Minimum confidence for `click_element`.
    pub click_confidence: f64,
    /// Delay between simulated keystrokes.
    pub keystroke_delay_ms: u64,
    /// `wait_for` polling interval.
    pub wait_poll_interval_ms: u64,
    /// `wait_for` budget when the call gives none.
    pub wait_default_timeout_ms: u64,
    /// `read_page` character limit.
    pub read_page_max_chars: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            click_confidence: 0.7,
            keystroke_delay_ms: 50,
            wait_poll_interval_ms: 100,
            wait_default_timeout_ms: 5000,
            read_page_max_chars: 5000,
        }
    }
}
