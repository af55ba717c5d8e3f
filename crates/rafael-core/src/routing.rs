//! Backend variants and per-step routing decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reasoning backend variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelVariant {
    /// Default general-purpose reasoner.
    ClaudeSonnet,
    /// Low-latency classifier.
    ClaudeHaiku,
    /// Vision-oriented model.
    Gemini,
    /// Long-context model.
    Kimi,
    /// Code-oriented model.
    Codex,
}

impl ModelVariant {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClaudeSonnet => "claude-sonnet",
            Self::ClaudeHaiku => "claude-haiku",
            Self::Gemini => "gemini",
            Self::Kimi => "kimi",
            Self::Codex => "codex",
        }
    }

    /// Parse a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        [
            Self::ClaudeSonnet,
            Self::ClaudeHaiku,
            Self::Gemini,
            Self::Kimi,
            Self::Codex,
        ]
        .into_iter()
        .find(|v| v.as_str() == name)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of work a step asks of the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Multi-step planning.
    ComplexReasoning,
    /// First look at a page snapshot.
    DomAnalysis,
    /// Classifying what the user wants.
    IntentClassification,
    /// Quick factual lookup.
    FastLookup,
    /// Reasoning over images.
    VisualAnalysis,
    /// Reasoning over a screenshot.
    ScreenshotAnalysis,
    /// Reading long documents.
    DocProcessing,
    /// Loading large context.
    ContextLoading,
    /// Anything else.
    Other,
}

impl TaskType {
    /// Task type for the `step`th backend call (one-based).
    pub const fn for_step(step: u32) -> Self {
        if step <= 1 {
            Self::DomAnalysis
        } else {
            Self::ComplexReasoning
        }
    }
}

/// Routing decision for one step. Computed fresh every step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRoute {
    /// Chosen backend variant.
    pub model: ModelVariant,
    /// Why this variant was chosen.
    pub reason: String,
    /// Expected latency in milliseconds.
    pub estimated_latency_ms: u64,
    /// Expected cost in USD.
    pub estimated_cost: f64,
}
