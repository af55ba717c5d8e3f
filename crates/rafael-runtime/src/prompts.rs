//! Prompt construction.
//!
//! The system prompt is built once per run from the task and the first
//! snapshot. The user prompt is rebuilt every step from the goal, the latest
//! snapshot and the full step history.

use std::fmt::Write as _;

use rafael_core::agent::{AgentStep, AgentTask};
use rafael_core::page::SemanticTree;
use rafael_core::tools::BrowserTool;
use serde_json::Value;

/// Elements listed in the user prompt when no limit is configured.
pub const DEFAULT_PROMPT_ELEMENTS: usize = 50;

/// History line used before the first step.
pub const NO_STEPS: &str = "No steps taken yet";

/// Tool vocabulary as bullet lines, in prompt order.
pub fn tool_descriptions() -> String {
    let mut out = String::new();
    for tool in BrowserTool::ALL {
        let _ = writeln!(out, "- {}: {}", tool.as_str(), tool.description());
    }
    out
}

/// System prompt for a run.
pub fn system_prompt(task: &AgentTask, tree: &SemanticTree, confidence_threshold: f64) -> String {
    format!(
        "You are Rafael, an autonomous agent that helps users accomplish tasks in web applications.

## Your Capabilities
You can perceive and interact with web pages using tools. You don't just point to buttons - you click them. You don't just show users what to do - you do it for them.

## Available Tools
{tools}
## Current Context
- User ID: {user}
- Session ID: {session}
- App ID: {app}
- Mode: {mode}
- Current URL: {url}
- Page Title: {title}

## Rules
1. Always prioritize user safety - don't perform destructive actions without confirmation
2. If confidence is below {confidence_threshold}, use ask_user tool
3. PII fields (passwords, credit cards, SSN) must never be accessed
4. Work within the current page first before navigating

## Response Format
Answer with a single JSON object: {{\"tool\": \"<tool name>\", \"params\": {{...}}}}

## Goal
{goal}
",
        tools = tool_descriptions(),
        user = task.user_id,
        session = task.session_id,
        app = task.app_id,
        mode = task.mode.as_str(),
        url = tree.url,
        title = tree.title,
        goal = task.goal,
    )
}

/// Numbered element list: `i. [tag] "label"`, with ` (hidden)` for elements
/// that were not visible at capture time.
pub fn element_list(tree: &SemanticTree, limit: usize) -> String {
    let mut out = String::new();
    for (i, el) in tree.elements.iter().take(limit).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{i}. [{}] \"{}\"", el.tag, el.display_label(i));
        if !el.visible {
            out.push_str(" (hidden)");
        }
    }
    let omitted = tree.elements.len().saturating_sub(limit);
    if omitted > 0 || tree.truncated {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("(element list truncated");
        if omitted > 0 {
            let _ = write!(out, ", {omitted} more not shown");
        }
        out.push(')');
    }
    out
}

/// Step history as `- Step n: tool(params) → result` lines.
pub fn history(steps: &[AgentStep]) -> String {
    if steps.is_empty() {
        return NO_STEPS.to_owned();
    }
    steps
        .iter()
        .map(|s| {
            format!(
                "- Step {}: {}({}) → {}",
                s.step,
                s.tool,
                Value::Object(s.params.clone()),
                s.result.to_value()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// User prompt for one step.
pub fn user_prompt(goal: &str, tree: &SemanticTree, steps: &[AgentStep], limit: usize) -> String {
    format!(
        "## Goal
{goal}

## Current Page Elements
{elements}

## Previous Steps
{history}

## Your Action
Analyze the current state and decide what to do next. Use one of the available tools.
",
        elements = element_list(tree, limit),
        history = history(steps),
    )
}

#[cfg(test)]
mod tests {
    use rafael_core::agent::AgentMode;
    use rafael_core::ids::{RunId, SessionId};
    use rafael_core::page::SemanticElement;
    use rafael_core::tools::ActionResult;
    use serde_json::{Map, json};

    use super::*;

    fn el(tag: &str, label: Option<&str>, visible: bool) -> SemanticElement {
        SemanticElement {
            tag: tag.into(),
            label: label.map(Into::into),
            visible,
            ..SemanticElement::default()
        }
    }

    fn tree(elements: Vec<SemanticElement>) -> SemanticTree {
        SemanticTree {
            url: "https://app.test/login".into(),
            title: "Sign in".into(),
            elements,
            timestamp: 0,
            truncated: false,
        }
    }

    fn task() -> AgentTask {
        AgentTask {
            run_id: RunId::from("run_1"),
            goal: "log in".into(),
            dom_snapshot: None,
            session_id: SessionId::from("session_1"),
            user_id: "user_1".into(),
            app_id: "acme".into(),
            org_id: None,
            mode: AgentMode::Execute,
        }
    }

    #[test]
    fn system_prompt_embeds_context() {
        let prompt = system_prompt(&task(), &tree(vec![]), 0.7);
        assert!(prompt.contains("- User ID: user_1"));
        assert!(prompt.contains("- Session ID: session_1"));
        assert!(prompt.contains("- App ID: acme"));
        assert!(prompt.contains("- Mode: execute"));
        assert!(prompt.contains("- Current URL: https://app.test/login"));
        assert!(prompt.contains("- Page Title: Sign in"));
        assert!(prompt.contains("If confidence is below 0.7, use ask_user tool"));
        assert!(prompt.trim_end().ends_with("## Goal\nlog in"));
    }

    #[test]
    fn system_prompt_lists_every_tool() {
        let prompt = system_prompt(&task(), &tree(vec![]), 0.7);
        for tool in BrowserTool::ALL {
            assert!(prompt.contains(&format!("- {}: ", tool.as_str())), "{tool}");
        }
    }

    #[test]
    fn element_lines_use_label_fallback() {
        let mut link = el("a", None, true);
        link.text = Some("Pricing".into());
        let list = element_list(
            &tree(vec![el("input", Some("Email"), true), link, el("div", None, false)]),
            50,
        );
        assert_eq!(
            list,
            "0. [input] \"Email\"\n1. [a] \"Pricing\"\n2. [div] \"div#2\" (hidden)"
        );
    }

    #[test]
    fn element_list_is_capped() {
        let elements = (0..60).map(|_| el("button", Some("Go"), true)).collect();
        let list = element_list(&tree(elements), 50);
        assert_eq!(list.lines().count(), 51);
        assert!(list.contains("49. [button]"));
        assert!(!list.contains("50. [button]"));
        assert!(list.ends_with("(element list truncated, 10 more not shown)"));
    }

    #[test]
    fn truncated_capture_is_noted() {
        let mut t = tree(vec![el("button", Some("Go"), true)]);
        t.truncated = true;
        assert!(element_list(&t, 50).ends_with("\n(element list truncated)"));
    }

    #[test]
    fn empty_history() {
        assert_eq!(history(&[]), "No steps taken yet");
    }

    #[test]
    fn history_lines() {
        let mut params = Map::new();
        let _ = params.insert("label".into(), json!("Submit"));
        let steps = vec![AgentStep {
            step: 1,
            tool: "click_element".into(),
            params,
            result: ActionResult::failure("Element not found"),
            reasoning: None,
        }];
        assert_eq!(
            history(&steps),
            "- Step 1: click_element({\"label\":\"Submit\"}) → {\"error\":\"Element not found\",\"success\":false}"
        );
    }

    #[test]
    fn user_prompt_sections() {
        let prompt = user_prompt("log in", &tree(vec![el("button", Some("Submit"), true)]), &[], 50);
        assert!(prompt.starts_with("## Goal\nlog in\n"));
        assert!(prompt.contains("## Current Page Elements\n0. [button] \"Submit\"\n"));
        assert!(prompt.contains("## Previous Steps\nNo steps taken yet\n"));
    }
}
