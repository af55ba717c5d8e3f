//! Tool vocabulary, tool calls and action results.
//!
//! The backend may only ask for the tools in [`BrowserTool`]. Wire names are
//! stable snake_case strings; everything that dispatches on a tool matches
//! the enum exhaustively so adding a tool is a compile-checked change.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of tools the backend can call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserTool {
    /// Read the rendered page text.
    ReadPage,
    /// Click an element by label.
    ClickElement,
    /// Type into a text field.
    FillField,
    /// Choose a value in a dropdown.
    SelectOption,
    /// Change the page location.
    Navigate,
    /// Scroll an element into view.
    ScrollTo,
    /// Wait for an element to appear.
    WaitFor,
    /// Show a guidance tooltip.
    ShowTooltip,
    /// Ask the human a question.
    AskUser,
    /// Finish the run successfully.
    Complete,
    /// Give up on the run.
    Abort,
}

impl BrowserTool {
    /// Every tool, in prompt order.
    pub const ALL: [Self; 11] = [
        Self::ReadPage,
        Self::ClickElement,
        Self::FillField,
        Self::SelectOption,
        Self::Navigate,
        Self::ScrollTo,
        Self::WaitFor,
        Self::ShowTooltip,
        Self::AskUser,
        Self::Complete,
        Self::Abort,
    ];

    /// Stable wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadPage => "read_page",
            Self::ClickElement => "click_element",
            Self::FillField => "fill_field",
            Self::SelectOption => "select_option",
            Self::Navigate => "navigate",
            Self::ScrollTo => "scroll_to",
            Self::WaitFor => "wait_for",
            Self::ShowTooltip => "show_tooltip",
            Self::AskUser => "ask_user",
            Self::Complete => "complete",
            Self::Abort => "abort",
        }
    }

    /// Look up a tool by wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// One-line description used in the system prompt.
    pub const fn description(self) -> &'static str {
        match self {
            Self::ReadPage => {
                "Read the current page content. Use when you need to understand what's on the page."
            }
            Self::ClickElement => "Click an element by label. Requires confidence score.",
            Self::FillField => "Fill a form field with text.",
            Self::SelectOption => "Select an option from a dropdown.",
            Self::Navigate => "Navigate to a relative path.",
            Self::ScrollTo => "Scroll to an element.",
            Self::WaitFor => "Wait for an element to appear.",
            Self::ShowTooltip => "Show a tooltip to guide the user.",
            Self::AskUser => "Ask the user a question when you need clarification.",
            Self::Complete => "Signal task completion with a summary.",
            Self::Abort => "Abort the task with a reason.",
        }
    }

    /// Whether the tool ends the run instead of acting on the page.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Abort)
    }
}

impl fmt::Display for BrowserTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool call
// ─────────────────────────────────────────────────────────────────────────────

/// One tool invocation as produced by the backend.
///
/// The name is kept as received so an unknown tool can still be recorded and
/// reported; [`ToolCall::kind`] maps it onto the closed vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool wire name.
    pub tool: String,
    /// Raw parameter object.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ToolCall {
    /// Build a call for a known tool.
    pub fn new(tool: BrowserTool, params: Map<String, Value>) -> Self {
        Self {
            tool: tool.as_str().to_owned(),
            params,
        }
    }

    /// The tool this call names, if it is part of the vocabulary.
    pub fn kind(&self) -> Option<BrowserTool> {
        BrowserTool::parse(&self.tool)
    }

    /// Decode the parameters into their typed form.
    pub fn typed_params(&self) -> Result<ToolParams, serde_json::Error> {
        ToolParams::from_map(&self.params)
    }
}

/// Typed view of a tool's parameter object. Unused fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolParams {
    /// Target element label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Backend confidence in the action, 0.0–1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Text for `fill_field`, option value for `select_option`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Alternative option value for `select_option`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    /// Target for `navigate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Scroll alignment hint for `scroll_to` (`top`, `center`, `bottom`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// `wait_for` budget in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Tooltip text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// `ask_user` question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// `ask_user` answer choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// `complete` summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// `abort` reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// `read_page` focus hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
}

impl ToolParams {
    /// Decode from a raw parameter map.
    ///
    /// Fails only when a known field has the wrong JSON type.
    pub fn from_map(params: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(params.clone()))
    }

    /// The label, treating an empty string as absent.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref().filter(|l| !l.is_empty())
    }

    /// `wait_for` timeout in whole milliseconds.
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout
            .filter(|t| t.is_finite() && *t >= 0.0)
            .map(|t| t.round() as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Action result
// ─────────────────────────────────────────────────────────────────────────────

/// Reported outcome of one executed action.
///
/// Expected failures (nothing matched, low confidence, timeouts) are values of
/// this type with `success: false`, never errors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the action took effect.
    pub success: bool,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Text payload (`read_page`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool-specific metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ActionResult {
    /// Plain success.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// Success carrying metadata.
    pub fn ok_with(details: Value) -> Self {
        Self {
            success: true,
            details: Some(details),
            ..Default::default()
        }
    }

    /// Success carrying page text.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(text.into()),
            ..Default::default()
        }
    }

    /// Reported failure.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// JSON form recorded in step history.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
