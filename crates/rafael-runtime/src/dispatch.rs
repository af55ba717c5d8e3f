//! Where tool calls go.
//!
//! [`LocalDispatcher`] executes calls against a page it owns and re-captures
//! the page after every step. [`RelayDispatcher`] is the distributed variant:
//! it publishes each call as a stream event for the caller's page to execute.
//! Both route `ask_user` through the [`InterventionService`] when one is
//! attached.

use std::sync::Arc;

use async_trait::async_trait;
use rafael_actions::ActionExecutor;
use rafael_core::events::StreamEvent;
use rafael_core::ids::SessionId;
use rafael_core::page::SemanticTree;
use rafael_core::tools::{ActionResult, BrowserTool, ToolCall, ToolParams};
use rafael_dom::Distiller;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::errors::{Result, RuntimeError};
use crate::interventions::{InterventionRequest, InterventionService, InterventionStatus};
use crate::relay::EventRelay;

/// Executes one non-terminal tool call per step.
#[async_trait]
pub trait ToolDispatcher: Send {
    /// Carry out `call` and report what happened.
    async fn dispatch(&mut self, call: &ToolCall) -> Result<ActionResult>;

    /// Fresh snapshot of the page after the last dispatch, when the
    /// dispatcher can see the page.
    async fn observe(&mut self) -> Option<SemanticTree> {
        None
    }
}

/// The human side of `ask_user`: a service plus the session to ask in.
#[derive(Clone, Debug)]
pub struct HumanChannel {
    service: Arc<InterventionService>,
    session_id: SessionId,
}

impl HumanChannel {
    /// Ask in `session_id`. The session must already exist on `service`.
    pub fn new(service: Arc<InterventionService>, session_id: SessionId) -> Self {
        Self { service, session_id }
    }

    /// Raise an intervention for `params.question` and wait for the answer.
    ///
    /// Approval succeeds with the response as content. Rejection and timeout
    /// are failed results; the run goes on.
    pub async fn ask(&self, params: &ToolParams) -> Result<ActionResult> {
        let question = params.question.clone().unwrap_or_default();
        let mut context = Map::new();
        let _ = context.insert("tool".into(), Value::from(BrowserTool::AskUser.as_str()));
        let raised = self.service.request(InterventionRequest {
            session_id: self.session_id.clone(),
            reason: question,
            context,
            options: params.options.clone(),
            timeout: None,
        })?;
        let answered = if raised.status == InterventionStatus::Pending {
            self.service.wait(&raised.id, None).await?
        } else {
            raised
        };

        let details = json!({
            "interventionId": answered.id,
            "status": answered.status,
        });
        info!(id = %answered.id, status = %answered.status, "ask_user answered");
        Ok(match answered.status {
            InterventionStatus::Approved => ActionResult {
                content: answered.response,
                ..ActionResult::ok_with(details)
            },
            InterventionStatus::Rejected => ActionResult {
                details: Some(details),
                content: answered.response,
                ..ActionResult::failure("User declined")
            },
            InterventionStatus::Timeout | InterventionStatus::Pending => ActionResult {
                details: Some(details),
                ..ActionResult::failure("No response from user")
            },
        })
    }
}

fn typed(call: &ToolCall) -> Result<ToolParams> {
    call.typed_params().map_err(|source| RuntimeError::InvalidParams {
        tool: call.tool.clone(),
        source,
    })
}

fn no_human() -> ActionResult {
    ActionResult::failure("No human available to answer")
}

fn missing_question() -> ActionResult {
    ActionResult::failure("Missing required parameter: question")
}

// ─────────────────────────────────────────────────────────────────────────────
// Local
// ─────────────────────────────────────────────────────────────────────────────

/// Executes calls on a page held in-process.
pub struct LocalDispatcher {
    executor: ActionExecutor,
    distiller: Distiller,
    human: Option<HumanChannel>,
}

impl LocalDispatcher {
    /// Dispatcher over `executor`, capturing with `distiller`.
    pub fn new(executor: ActionExecutor, distiller: Distiller) -> Self {
        Self {
            executor,
            distiller,
            human: None,
        }
    }

    /// Answer `ask_user` through `human`.
    #[must_use]
    pub fn with_human(mut self, human: HumanChannel) -> Self {
        self.human = Some(human);
        self
    }

    /// The executor and the page it owns.
    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Take back the executor.
    pub fn into_executor(self) -> ActionExecutor {
        self.executor
    }
}

#[async_trait]
impl ToolDispatcher for LocalDispatcher {
    async fn dispatch(&mut self, call: &ToolCall) -> Result<ActionResult> {
        if call.kind() != Some(BrowserTool::AskUser) {
            return Ok(self.executor.execute(call).await?);
        }
        let params = typed(call)?;
        if params.question.as_deref().is_none_or(str::is_empty) {
            return Ok(missing_question());
        }
        match &self.human {
            Some(human) => human.ask(&params).await,
            None => Ok(no_human()),
        }
    }

    async fn observe(&mut self) -> Option<SemanticTree> {
        Some(self.distiller.capture(self.executor.document()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay
// ─────────────────────────────────────────────────────────────────────────────

/// Publishes calls as stream events for a remote page to execute.
///
/// The result only says the event went out; the remote outcome is not fed
/// back into the run.
pub struct RelayDispatcher {
    relay: Arc<EventRelay>,
    human: Option<HumanChannel>,
}

impl RelayDispatcher {
    /// Dispatcher publishing to `relay`.
    pub fn new(relay: Arc<EventRelay>) -> Self {
        Self { relay, human: None }
    }

    /// Also wait on `human` for `ask_user` answers.
    #[must_use]
    pub fn with_human(mut self, human: HumanChannel) -> Self {
        self.human = Some(human);
        self
    }
}

#[async_trait]
impl ToolDispatcher for RelayDispatcher {
    async fn dispatch(&mut self, call: &ToolCall) -> Result<ActionResult> {
        let Some(kind) = call.kind() else {
            return Ok(ActionResult::failure(format!("Unknown tool: {}", call.tool)));
        };
        let params = typed(call)?;
        match kind {
            BrowserTool::AskUser => {
                let Some(question) = params.question.as_deref().filter(|q| !q.is_empty()) else {
                    return Ok(missing_question());
                };
                let options = params.options.clone().unwrap_or_default();
                let index = self.relay.publish(StreamEvent::ask_user(question, &options));
                debug!(index, "ask_user relayed");
                match &self.human {
                    Some(human) => human.ask(&params).await,
                    None => Ok(ActionResult::ok_with(json!({ "relayed": true, "index": index }))),
                }
            }
            _ => {
                let index = self.relay.publish(StreamEvent::action(call));
                debug!(index, tool = %kind, "action relayed");
                Ok(ActionResult::ok_with(json!({ "relayed": true, "index": index })))
            }
        }
    }
}
