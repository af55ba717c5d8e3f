//! A full run against a local page: scripted backend, real executor.

use std::sync::Arc;

use rafael_actions::ActionExecutor;
use rafael_core::agent::{AgentMode, AgentTask, RunOutcome};
use rafael_core::ids::{RunId, SessionId};
use rafael_dom::{Distiller, Document, DomEventKind};
use rafael_runtime::{LocalDispatcher, RafaelAgent, ScriptedBackend};
use rafael_settings::{AgentSettings, DistillerSettings, ExecutorSettings};
use serde_json::json;

const LOGIN_PAGE: &str = r#"<html>
<head><title>Sign in</title></head>
<body>
  <form>
    <label for="email">Email</label>
    <input id="email" name="email" type="email">
    <button id="submit" type="submit">Submit</button>
  </form>
</body>
</html>"#;

fn dispatcher() -> LocalDispatcher {
    let doc = Document::parse(LOGIN_PAGE, "https://app.test/login").unwrap();
    LocalDispatcher::new(
        ActionExecutor::new(doc, ExecutorSettings::default()),
        Distiller::new(DistillerSettings::default()),
    )
}

fn task(goal: &str) -> AgentTask {
    AgentTask {
        run_id: RunId::new(),
        goal: goal.into(),
        dom_snapshot: None,
        session_id: SessionId::from("session_login"),
        user_id: "user_1".into(),
        app_id: "acme".into(),
        org_id: None,
        mode: AgentMode::Execute,
    }
}

fn agent(backend: &Arc<ScriptedBackend>, max_steps: u32) -> RafaelAgent {
    RafaelAgent::new(
        backend.clone(),
        AgentSettings {
            max_steps,
            ..AgentSettings::default()
        },
    )
}

#[tokio::test(start_paused = true)]
async fn fills_clicks_and_completes() {
    let backend = Arc::new(ScriptedBackend::from_tool_calls(
        &[
            json!({"tool": "fill_field", "params": {"label": "Email", "value": "a@b.com", "confidence": 0.9}}),
            json!({"tool": "click_element", "params": {"label": "Submit", "confidence": 0.9}}),
            json!({"tool": "complete", "params": {"summary": "logged in"}}),
        ],
        120,
    ));
    let mut dispatcher = dispatcher();

    let result = agent(&backend, 10)
        .execute(&task("log in"), &mut dispatcher)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.outcome, RunOutcome::Completed);
    assert_eq!(result.summary, "logged in");
    assert_eq!(result.token_count, 360);
    let tools: Vec<_> = result.steps.iter().map(|s| s.tool.as_str()).collect();
    assert_eq!(tools, ["fill_field", "click_element", "complete"]);
    assert!(result.steps.iter().all(|s| s.result.success));

    let doc = dispatcher.executor().document();
    let email = doc.get_element_by_id("email").unwrap();
    let submit = doc.get_element_by_id("submit").unwrap();
    assert_eq!(doc.value(email).as_deref(), Some("a@b.com"));
    let clicks: Vec<_> = doc
        .events()
        .iter()
        .filter(|e| e.target == submit)
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        clicks,
        [DomEventKind::MouseDown, DomEventKind::MouseUp, DomEventKind::Click]
    );
}

#[tokio::test(start_paused = true)]
async fn prompts_follow_the_page_and_history() {
    let backend = Arc::new(ScriptedBackend::from_tool_calls(
        &[
            json!({"tool": "fill_field", "params": {"label": "Email", "value": "a@b.com", "confidence": 0.9}}),
            json!({"tool": "complete", "params": {}}),
        ],
        10,
    ));
    let mut dispatcher = dispatcher();

    let result = agent(&backend, 10)
        .execute(&task("log in"), &mut dispatcher)
        .await
        .unwrap();
    assert_eq!(result.summary, "Task completed");

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].system.contains("Current URL: https://app.test/login"));
    assert!(calls[0].system.contains("Page Title: Sign in"));
    assert!(calls[0].user.contains(r#"[input] "Email""#));
    assert!(calls[0].user.contains(r#"[button] "Submit""#));
    assert!(calls[0].user.contains("No steps taken yet"));
    assert!(calls[1].user.contains("- Step 1: fill_field("));
}

#[tokio::test(start_paused = true)]
async fn unresolvable_target_is_reported_back_to_the_model() {
    let backend = Arc::new(ScriptedBackend::from_tool_calls(
        &[
            json!({"tool": "click_element", "params": {"label": "Sign up", "confidence": 0.9}}),
            json!({"tool": "abort", "params": {"reason": "no sign up button"}}),
        ],
        10,
    ));
    let mut dispatcher = dispatcher();

    let result = agent(&backend, 10)
        .execute(&task("create an account"), &mut dispatcher)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.outcome, RunOutcome::Aborted);
    assert_eq!(result.summary, "no sign up button");
    assert!(!result.steps[0].result.success);
    assert!(backend.calls()[1].user.contains("Element not found"));
    assert!(dispatcher.executor().document().events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn system_prompt_tracks_navigation() {
    let backend = Arc::new(ScriptedBackend::from_tool_calls(
        &[
            json!({"tool": "navigate", "params": {"path": "/billing"}}),
            json!({"tool": "complete", "params": {"summary": "on billing"}}),
        ],
        10,
    ));
    let mut dispatcher = dispatcher();

    let result = agent(&backend, 10)
        .execute(&task("open billing"), &mut dispatcher)
        .await
        .unwrap();
    assert!(result.success);
    assert!(result.steps[0].result.success);

    let calls = backend.calls();
    assert!(calls[0].system.contains("- Current URL: https://app.test/login"));
    assert!(calls[1].system.contains("- Current URL: https://app.test/billing"));
    assert!(!calls[1].system.contains("https://app.test/login"));
}

#[tokio::test(start_paused = true)]
async fn unknown_tool_does_not_end_the_run() {
    let backend = Arc::new(ScriptedBackend::from_tool_calls(
        &[
            json!({"tool": "hover", "params": {"label": 7}}),
            json!({"tool": "complete", "params": {}}),
        ],
        10,
    ));
    let mut dispatcher = dispatcher();

    let result = agent(&backend, 10)
        .execute(&task("log in"), &mut dispatcher)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.steps[0].result.error.as_deref(), Some("Unknown tool: hover"));
    assert!(backend.calls()[1].user.contains("Unknown tool: hover"));
}
