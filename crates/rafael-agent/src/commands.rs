//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rafael_actions::ActionExecutor;
use rafael_core::agent::{AgentMode, AgentTask};
use rafael_core::events::{EventPayload, StreamEvent, StreamEventKind};
use rafael_core::ids::{RunId, SessionId};
use rafael_dom::{Distiller, Document};
use rafael_runtime::{
    Backend, HolMode, HttpBackend, HumanChannel, InterventionService, LocalDispatcher,
    RafaelAgent, ScriptedBackend,
};
use rafael_settings::RafaelSettings;
use rafael_stream::{Channel, HttpStreamSource, RealtimeClient};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// App id stamped on runs started from the command line.
const CLI_APP_ID: &str = "cli";

fn load_page(path: &Path, url: &str) -> Result<Document> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Document::parse(&html, url).with_context(|| format!("Failed to load {} as {url}", path.display()))
}

fn print_json(value: &impl serde::Serialize, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// capture
// ─────────────────────────────────────────────────────────────────────────────

/// Print the semantic tree of `html`.
pub fn capture(settings: &RafaelSettings, html: &Path, url: &str, pretty: bool) -> Result<()> {
    let doc = load_page(html, url)?;
    let tree = Distiller::new(settings.distiller.clone()).capture(&doc);
    info!(elements = tree.elements.len(), truncated = tree.truncated, "page captured");
    print_json(&tree, pretty)
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

/// Where `run` gets its decisions.
pub enum BackendChoice {
    /// Replay responses from a JSON file.
    Script(PathBuf),
    /// POST prompts to an HTTP endpoint.
    Http {
        /// Endpoint URL.
        endpoint: String,
        /// Bearer token.
        api_key: Option<String>,
    },
}

/// Arguments of `run`.
pub struct RunArgs {
    /// Page to act on.
    pub html: PathBuf,
    /// URL the page is loaded from.
    pub url: String,
    /// What to accomplish.
    pub goal: String,
    /// Decision source.
    pub backend: BackendChoice,
    /// Step budget override.
    pub max_steps: Option<u32>,
    /// Approve `ask_user` questions automatically.
    pub auto_approve: bool,
    /// Session id.
    pub session: String,
    /// User id.
    pub user: String,
}

fn build_backend(choice: BackendChoice, settings: &RafaelSettings) -> Result<Arc<dyn Backend>> {
    Ok(match choice {
        BackendChoice::Script(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let scripted = ScriptedBackend::from_json(&text)
                .with_context(|| format!("Invalid backend script {}", path.display()))?;
            info!(responses = scripted.remaining(), "using scripted backend");
            Arc::new(scripted)
        }
        BackendChoice::Http { endpoint, api_key } => {
            let mut backend = HttpBackend::new(endpoint, &settings.agent);
            if let Some(key) = api_key {
                backend = backend.with_api_key(key);
            }
            Arc::new(backend)
        }
    })
}

/// Run a goal against a local page and print the result. Returns whether the
/// goal was reached.
pub async fn run(settings: &RafaelSettings, args: RunArgs) -> Result<bool> {
    let doc = load_page(&args.html, &args.url)?;
    let backend = build_backend(args.backend, settings)?;

    let mut agent_settings = settings.agent.clone();
    if let Some(max_steps) = args.max_steps {
        agent_settings.max_steps = max_steps;
    }
    let agent = RafaelAgent::new(backend, agent_settings)
        .with_prompt_elements(settings.distiller.prompt_elements);

    let session_id = SessionId::from(args.session);
    let mut dispatcher = LocalDispatcher::new(
        ActionExecutor::new(doc, settings.executor.clone()),
        Distiller::new(settings.distiller.clone()),
    );
    // nobody reads stdin, so questions only get answers in auto mode
    let interventions = (args.auto_approve || settings.interventions.auto_approve).then(|| {
        let service = Arc::new(InterventionService::new(&settings.interventions));
        let _ = service.create_session(session_id.clone(), HolMode::Auto, true);
        service
    });
    if let Some(service) = &interventions {
        dispatcher = dispatcher.with_human(HumanChannel::new(Arc::clone(service), session_id.clone()));
    }

    let task = AgentTask {
        run_id: RunId::new(),
        goal: args.goal,
        dom_snapshot: None,
        session_id: session_id.clone(),
        user_id: args.user,
        app_id: CLI_APP_ID.into(),
        org_id: None,
        mode: AgentMode::Execute,
    };
    let result = agent.execute(&task, &mut dispatcher).await?;
    if let Some(service) = interventions {
        let _ = service.end_session(&session_id);
    }

    print_json(&result, true)?;
    Ok(result.success)
}

// ─────────────────────────────────────────────────────────────────────────────
// watch
// ─────────────────────────────────────────────────────────────────────────────

fn is_last(event: &StreamEvent) -> bool {
    event.kind == StreamEventKind::Complete || event.is_fatal()
}

/// Follow a run's stream, printing each event as a JSON line. With `html`,
/// streamed actions are executed against that page and their results printed
/// too. Returns whether the run completed.
pub async fn watch(
    settings: &RafaelSettings,
    run_id: String,
    token: String,
    base_url: Option<String>,
    html: Option<&Path>,
    url: &str,
) -> Result<bool> {
    let mut executor = match html {
        Some(path) => Some(ActionExecutor::new(load_page(path, url)?, settings.executor.clone())),
        None => None,
    };
    let base_url = base_url.unwrap_or_else(|| settings.stream.base_url.clone());
    let source = Arc::new(HttpStreamSource::new(base_url));
    let client = RealtimeClient::from_settings(source, RunId::from(run_id), token, &settings.stream);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _ = client.on(Channel::All, move |event| {
        let _ = tx.send(event.clone());
    });
    client.connect();

    let mut completed = false;
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                print_json(&event, false)?;
                if let (Some(executor), Ok(EventPayload::Action(call))) = (executor.as_mut(), event.payload()) {
                    let result = executor.execute(&call).await?;
                    print_json(&json!({ "index": event.index, "result": result }), false)?;
                }
                if is_last(&event) {
                    completed = event.kind == StreamEventKind::Complete;
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("interrupted, disconnecting");
                break;
            }
        }
    }
    client.disconnect();
    Ok(completed)
}
