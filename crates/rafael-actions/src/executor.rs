//! Page action executor.
//!
//! [`ActionExecutor`] owns the page for the duration of a run; every action
//! takes `&mut self`, so actions on one page are strictly serialized. Each
//! action resolves its target through a [`strategy`](crate::strategy) cascade
//! and mutates the document only after resolution succeeds.
//!
//! Timed waits (`fill_field` keystrokes, `wait_for` polling) sleep on the tokio
//! clock and advance the page clock by the same amount, so scripted page
//! changes land while the executor is waiting.

use std::time::Duration;

use rafael_core::text::truncate_chars;
use rafael_core::tools::{ActionResult, BrowserTool, ToolCall, ToolParams};
use rafael_dom::{Document, DomEventKind, NodeId, ScrollAlign};
use rafael_settings::ExecutorSettings;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::errors::{ExecutorError, Result};
use crate::strategy::{self, CLICKABLE, FILLABLE, Resolution, TEXT_ONLY};

/// Applies tool calls to one page.
pub struct ActionExecutor {
    doc: Document,
    settings: ExecutorSettings,
}

impl ActionExecutor {
    /// Executor over `doc`.
    pub fn new(doc: Document, settings: ExecutorSettings) -> Self {
        Self { doc, settings }
    }

    /// The page.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access to the page, for page scripts and test setup.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Give the page back.
    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Active settings.
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Execute a decoded tool call.
    pub async fn execute(&mut self, call: &ToolCall) -> Result<ActionResult> {
        self.execute_tool(&call.tool, &call.params).await
    }

    /// Execute `tool` with raw parameters.
    ///
    /// Unknown tools and tools that do not act on the page (`ask_user`,
    /// `complete`, `abort`) are reported as failures. Parameters of the wrong
    /// JSON type are an [`ExecutorError::InvalidParams`].
    #[instrument(skip_all, fields(tool = %tool))]
    pub async fn execute_tool(&mut self, tool: &str, params: &Map<String, Value>) -> Result<ActionResult> {
        let Some(kind) = BrowserTool::parse(tool) else {
            warn!(tool, "unknown tool");
            return Ok(unknown(tool));
        };
        let params = ToolParams::from_map(params).map_err(|source| ExecutorError::InvalidParams {
            tool: tool.to_owned(),
            source,
        })?;

        let result = match kind {
            BrowserTool::ReadPage => self.read_page(&params),
            BrowserTool::ClickElement => self.click(&params),
            BrowserTool::FillField => self.fill(&params).await,
            BrowserTool::SelectOption => self.select(&params),
            BrowserTool::Navigate => self.navigate(&params),
            BrowserTool::ScrollTo => self.scroll_to(&params),
            BrowserTool::WaitFor => self.wait_for(&params).await,
            BrowserTool::ShowTooltip => self.show_tooltip(&params),
            BrowserTool::AskUser | BrowserTool::Complete | BrowserTool::Abort => unknown(tool),
        };
        debug!(success = result.success, error = result.error.as_deref(), "action finished");
        Ok(result)
    }

    // ─── Read ────────────────────────────────────────────────────────────

    fn read_page(&self, params: &ToolParams) -> ActionResult {
        let focus = params
            .focus_area
            .as_deref()
            .and_then(|area| find_region(&self.doc, area));
        let text = match focus {
            Some(region) => rafael_dom::render::rendered_text(&self.doc, region),
            None => self.doc.rendered_text(),
        };
        let max = self.settings.read_page_max_chars;
        let clipped = truncate_chars(&text, max);
        ActionResult {
            details: Some(json!({
                "focused": focus.is_some(),
                "truncated": clipped.len() < text.len(),
            })),
            ..ActionResult::content(clipped)
        }
    }

    // ─── Click ───────────────────────────────────────────────────────────

    fn click(&mut self, params: &ToolParams) -> ActionResult {
        let threshold = self.settings.click_confidence;
        let Some(confidence) = params.confidence else {
            return ActionResult::failure("Missing required parameter: confidence");
        };
        if confidence.is_nan() || confidence < threshold {
            warn!(confidence, threshold, "click rejected: confidence too low");
            return ActionResult {
                details: Some(json!({ "confidence": confidence, "threshold": threshold })),
                ..ActionResult::failure("Confidence too low")
            };
        }
        let Some(label) = params.label() else {
            return missing("label");
        };
        let Some(found) = strategy::resolve(&self.doc, CLICKABLE, label, strategy::any_element) else {
            return not_found("Element not found", label);
        };

        self.doc.scroll_into_view(found.node, ScrollAlign::Center);
        for kind in [DomEventKind::MouseDown, DomEventKind::MouseUp, DomEventKind::Click] {
            self.doc.dispatch(found.node, kind);
        }
        info!(label, strategy = %found.strategy, "clicked");
        resolved(&self.doc, found)
    }

    // ─── Form controls ───────────────────────────────────────────────────

    async fn fill(&mut self, params: &ToolParams) -> ActionResult {
        let Some(label) = params.label() else {
            return missing("label");
        };
        let Some(value) = params.value.as_deref() else {
            return missing("value");
        };
        let Some(found) = strategy::resolve(&self.doc, FILLABLE, label, strategy::text_control) else {
            return not_found("Field not found", label);
        };

        let delay = Duration::from_millis(self.settings.keystroke_delay_ms);
        let mut typed = String::with_capacity(value.len());
        self.doc.set_value(found.node, "");
        for ch in value.chars() {
            typed.push(ch);
            self.doc.set_value(found.node, &typed);
            self.doc.dispatch(found.node, DomEventKind::Input);
            self.pause(delay).await;
        }
        self.doc.dispatch(found.node, DomEventKind::Change);
        info!(label, strategy = %found.strategy, chars = typed.chars().count(), "filled");
        resolved(&self.doc, found)
    }

    fn select(&mut self, params: &ToolParams) -> ActionResult {
        let Some(label) = params.label() else {
            return missing("label");
        };
        let Some(value) = params.value.as_deref().or(params.option.as_deref()) else {
            return missing("value");
        };
        let Some(found) = strategy::resolve(&self.doc, FILLABLE, label, strategy::select_control) else {
            return not_found("Select not found", label);
        };

        self.doc.set_value(found.node, value);
        self.doc.dispatch(found.node, DomEventKind::Change);
        let matched = self
            .doc
            .elements_under(found.node)
            .any(|o| self.doc.tag(o) == Some("option") && self.doc.option_value(o) == value);
        if !matched {
            warn!(label, value, "no option carries the selected value");
        }
        info!(label, value, strategy = %found.strategy, "selected");
        let mut result = resolved(&self.doc, found);
        if let Some(Value::Object(details)) = result.details.as_mut() {
            let _ = details.insert("matchedOption".into(), Value::Bool(matched));
        }
        result
    }

    // ─── Location and viewport ───────────────────────────────────────────

    fn navigate(&mut self, params: &ToolParams) -> ActionResult {
        let Some(path) = params.path.as_deref().filter(|p| !p.is_empty()) else {
            return missing("path");
        };
        let outcome = if is_absolute(path) {
            self.doc.navigate(path)
        } else {
            self.doc.set_path(path)
        };
        match outcome {
            Ok(()) => {
                info!(url = %self.doc.href(), "navigated");
                ActionResult::ok_with(json!({ "url": self.doc.href() }))
            }
            Err(e) => {
                warn!(path, error = %e, "navigation failed");
                ActionResult::failure(e.to_string())
            }
        }
    }

    fn scroll_to(&mut self, params: &ToolParams) -> ActionResult {
        let Some(label) = params.label() else {
            return missing("label");
        };
        let Some(found) = strategy::resolve(&self.doc, TEXT_ONLY, label, strategy::any_element) else {
            return not_found("Element not found", label);
        };
        let align = ScrollAlign::from_position(params.position.as_deref());
        self.doc.scroll_into_view(found.node, align);
        debug!(label, scroll_y = self.doc.viewport().scroll_y, "scrolled");
        resolved(&self.doc, found)
    }

    // ─── Waiting ─────────────────────────────────────────────────────────

    async fn wait_for(&mut self, params: &ToolParams) -> ActionResult {
        let Some(label) = params.label() else {
            return missing("label");
        };
        let timeout_ms = params
            .timeout_ms()
            .filter(|t| *t > 0)
            .unwrap_or(self.settings.wait_default_timeout_ms);
        let timeout = Duration::from_millis(timeout_ms);
        let poll = Duration::from_millis(self.settings.wait_poll_interval_ms.max(1));
        let started = tokio::time::Instant::now();

        loop {
            if let Some(found) = strategy::resolve(&self.doc, TEXT_ONLY, label, strategy::any_element) {
                let waited_ms = started.elapsed().as_millis() as u64;
                debug!(label, waited_ms, "element appeared");
                let mut result = resolved(&self.doc, found);
                if let Some(Value::Object(details)) = result.details.as_mut() {
                    let _ = details.insert("waitedMs".into(), json!(waited_ms));
                }
                return result;
            }
            if started.elapsed() >= timeout {
                break;
            }
            self.pause(poll).await;
        }
        warn!(label, timeout_ms, "timed out waiting for element");
        ActionResult {
            details: Some(json!({ "timeoutMs": timeout_ms })),
            ..ActionResult::failure("Timeout waiting for element")
        }
    }

    /// Sleep, then let the page catch up by the same amount.
    async fn pause(&mut self, by: Duration) {
        if by.is_zero() {
            return;
        }
        tokio::time::sleep(by).await;
        let _ = self.doc.advance(by);
    }

    // ─── Guidance ────────────────────────────────────────────────────────

    fn show_tooltip(&mut self, params: &ToolParams) -> ActionResult {
        let label = params.label().unwrap_or_default();
        let message = params.message.as_deref().unwrap_or_default();
        let anchor = (!label.is_empty())
            .then(|| strategy::resolve(&self.doc, CLICKABLE, label, strategy::any_element))
            .flatten();
        self.doc.show_tooltip(label, message, anchor.map(|r| r.node));
        info!(label, message, anchored = anchor.is_some(), "tooltip shown");
        ActionResult::ok_with(json!({
            "anchored": anchor.is_some(),
            "strategy": anchor.map(|r| r.strategy.as_str()),
        }))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn unknown(tool: &str) -> ActionResult {
    ActionResult::failure(format!("Unknown tool: {tool}"))
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// First element whose tag, role or id names `area`.
fn find_region(doc: &Document, area: &str) -> Option<NodeId> {
    let area = area.trim();
    if area.is_empty() {
        return None;
    }
    doc.elements().find(|&n| {
        doc.tag(n).is_some_and(|t| t.eq_ignore_ascii_case(area))
            || doc.attr(n, "role").is_some_and(|r| r.eq_ignore_ascii_case(area))
            || doc.attr(n, "id") == Some(area)
    })
}

fn missing(param: &str) -> ActionResult {
    ActionResult::failure(format!("Missing required parameter: {param}"))
}

fn not_found(error: &str, label: &str) -> ActionResult {
    debug!(label, error, "resolution failed");
    ActionResult {
        details: Some(json!({ "label": label })),
        ..ActionResult::failure(error)
    }
}

fn resolved(doc: &Document, found: Resolution) -> ActionResult {
    ActionResult::ok_with(json!({
        "strategy": found.strategy.as_str(),
        "tag": doc.tag(found.node),
    }))
}
