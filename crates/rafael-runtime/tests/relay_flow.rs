//! Launch a run, relay its steps and follow them through the hub.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rafael_core::agent::{AgentMode, AgentRequest};
use rafael_core::events::{EventPayload, StreamEvent, StreamEventKind};
use rafael_core::retry::BackoffPolicy;
use rafael_runtime::{RafaelAgent, RelayDispatcher, RelayHub, RunLauncher, ScriptedBackend};
use rafael_settings::{AgentSettings, CacheSettings};
use rafael_stream::{Channel, ConnectionState, RealtimeClient};
use serde_json::json;

fn request() -> AgentRequest {
    AgentRequest {
        goal: "subscribe to the newsletter".into(),
        dom_snapshot: None,
        session_id: "session_9".into(),
        user_id: "user_9".into(),
        mode: AgentMode::Execute,
    }
}

fn policy() -> BackoffPolicy {
    BackoffPolicy {
        max_attempts: 2,
        base_delay_ms: 100,
        max_delay_ms: 1000,
    }
}

#[tokio::test(start_paused = true)]
async fn client_receives_every_step_then_closes() {
    let launcher = Arc::new(RunLauncher::new(&CacheSettings::default()));
    let hub = Arc::new(RelayHub::new(Arc::clone(&launcher)));
    let launch = launcher.launch(request(), Some("rafael_acme")).unwrap();
    assert_eq!(launch.task.app_id, "acme");
    let relay = hub.relay(&launch.ticket.run_id);

    let backend = Arc::new(ScriptedBackend::from_tool_calls(
        &[
            json!({"tool": "fill_field", "params": {"label": "Email", "value": "a@b.com", "confidence": 0.95}}),
            json!({"tool": "click_element", "params": {"label": "Subscribe", "confidence": 0.95}}),
            json!({"tool": "complete", "params": {"summary": "subscribed"}}),
        ],
        50,
    ));
    let agent = RafaelAgent::new(backend, AgentSettings::default()).with_relay(Arc::clone(&relay));
    let mut dispatcher = RelayDispatcher::new(Arc::clone(&relay));
    let result = agent.execute(&launch.task, &mut dispatcher).await.unwrap();
    assert!(result.success);

    let client = RealtimeClient::new(
        hub.clone(),
        launch.ticket.run_id.clone(),
        launch.ticket.public_token.clone(),
        policy(),
    );
    let seen = Arc::new(Mutex::new(Vec::<StreamEvent>::new()));
    let sink = Arc::clone(&seen);
    let _ = client.on(Channel::All, move |event| sink.lock().push(event.clone()));
    client.connect();
    let mut state = client.watch_state();
    let _ = state.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();

    let seen = seen.lock();
    let kinds: Vec<_> = seen.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [
            StreamEventKind::Message,
            StreamEventKind::Action,
            StreamEventKind::Action,
            StreamEventKind::Complete,
        ]
    );
    let indices: Vec<_> = seen.iter().map(|e| e.index).collect();
    assert_eq!(indices, [Some(0), Some(1), Some(2), Some(3)]);
    assert!(matches!(
        seen[1].payload().unwrap(),
        EventPayload::Action(ref call) if call.tool == "fill_field"
    ));
    assert!(matches!(
        seen[3].payload().unwrap(),
        EventPayload::Complete { ref summary } if summary == "subscribed"
    ));
    assert_eq!(client.last_index(), Some(3));
}

#[tokio::test(start_paused = true)]
async fn expired_token_exhausts_reconnects() {
    let launcher = Arc::new(RunLauncher::new(&CacheSettings::default()));
    let hub = Arc::new(RelayHub::new(Arc::clone(&launcher)));
    let launch = launcher.launch(request(), Some("rafael_acme")).unwrap();
    let _ = hub.relay(&launch.ticket.run_id);
    assert!(launcher.revoke(&launch.ticket.public_token));

    let client = RealtimeClient::new(
        hub.clone(),
        launch.ticket.run_id.clone(),
        launch.ticket.public_token.clone(),
        policy(),
    );
    let fatal = Arc::new(Mutex::new(Vec::<StreamEvent>::new()));
    let sink = Arc::clone(&fatal);
    let _ = client.on(StreamEventKind::Error, move |event| sink.lock().push(event.clone()));
    client.connect();
    let mut state = client.watch_state();
    let _ = state.wait_for(|s| *s == ConnectionState::Failed).await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    let fatal = fatal.lock();
    assert_eq!(fatal.len(), 1);
    assert!(fatal[0].is_fatal());
}
