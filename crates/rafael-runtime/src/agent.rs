//! The orchestration loop.
//!
//! ```text
//! Start → (route → prompt → backend call → parse → [dispatch → record])*
//!       → Completed | ImplicitCompletion | Aborted | LowConfidence | MaxStepsReached
//! ```
//!
//! Both prompts are rebuilt from the latest observed page on every step.
//! The loop is strictly sequential. `complete` and `abort` are recorded but
//! never dispatched. Every other call is dispatched, recorded, and then its
//! confidence (1.0 when absent) is checked against the threshold; a low
//! score ends the run before the next step.

use std::sync::Arc;

use rafael_core::agent::{AgentResult, AgentStep, AgentTask, RunOutcome};
use rafael_core::events::StreamEvent;
use rafael_core::tools::{ActionResult, BrowserTool, ToolParams};
use rafael_settings::{AgentSettings, RafaelSettings};
use tracing::{debug, error, info, instrument, warn};

use crate::backend::Backend;
use crate::dispatch::ToolDispatcher;
use crate::errors::{Result, RuntimeError};
use crate::parse::parse_tool_call;
use crate::prompts::{self, DEFAULT_PROMPT_ELEMENTS};
use crate::relay::EventRelay;
use crate::router::ModelRouter;

/// Summary when `complete` carries none.
pub const DEFAULT_COMPLETE_SUMMARY: &str = "Task completed";
/// Summary when `abort` carries no reason.
pub const DEFAULT_ABORT_REASON: &str = "Task aborted";
/// Summary of a run stopped by a low confidence score.
pub const LOW_CONFIDENCE_SUMMARY: &str = "confidence too low, human input required";
/// Summary of a run that used up its steps.
pub const MAX_STEPS_SUMMARY: &str = "max steps reached";
/// Message published when a run starts.
pub const STARTING_MESSAGE: &str = "Starting agent...";

/// Drives one run against a backend.
pub struct RafaelAgent {
    backend: Arc<dyn Backend>,
    settings: AgentSettings,
    prompt_elements: usize,
    relay: Option<Arc<EventRelay>>,
}

impl RafaelAgent {
    /// Agent using `settings` and the default element list size.
    pub fn new(backend: Arc<dyn Backend>, settings: AgentSettings) -> Self {
        Self {
            backend,
            settings,
            prompt_elements: DEFAULT_PROMPT_ELEMENTS,
            relay: None,
        }
    }

    /// Agent configured from the full settings tree.
    pub fn from_settings(backend: Arc<dyn Backend>, settings: &RafaelSettings) -> Self {
        Self::new(backend, settings.agent.clone()).with_prompt_elements(settings.distiller.prompt_elements)
    }

    /// Publish lifecycle events to `relay`.
    #[must_use]
    pub fn with_relay(mut self, relay: Arc<EventRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// List at most `n` elements in each user prompt.
    #[must_use]
    pub fn with_prompt_elements(mut self, n: usize) -> Self {
        self.prompt_elements = n;
        self
    }

    /// Loop settings.
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run `task` to a terminal state.
    ///
    /// A start message is published first; the end publishes `complete` for
    /// a successful result and `error` otherwise, including when the run
    /// fails with an error.
    #[instrument(skip_all, fields(run_id = %task.run_id, max_steps = self.settings.max_steps))]
    pub async fn execute<D>(&self, task: &AgentTask, dispatcher: &mut D) -> Result<AgentResult>
    where
        D: ToolDispatcher + ?Sized,
    {
        self.publish(StreamEvent::message(STARTING_MESSAGE));
        match self.run(task, dispatcher).await {
            Ok(result) => {
                info!(
                    outcome = ?result.outcome,
                    steps = result.steps.len(),
                    tokens = result.token_count,
                    summary = %result.summary,
                    "run finished"
                );
                let event = if result.success {
                    StreamEvent::complete(result.summary.clone())
                } else {
                    StreamEvent::error(result.summary.clone())
                };
                self.publish(event);
                Ok(result)
            }
            Err(e) => {
                error!(error = %e, category = e.category(), "run failed");
                self.publish(StreamEvent::error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run<D>(&self, task: &AgentTask, dispatcher: &mut D) -> Result<AgentResult>
    where
        D: ToolDispatcher + ?Sized,
    {
        let threshold = self.settings.confidence_threshold;
        let max_steps = self.settings.max_steps;

        let mut tree = match dispatcher.observe().await {
            Some(tree) => tree,
            None => task.dom_snapshot.clone().unwrap_or_default(),
        };
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut tokens: u64 = 0;

        for step in 1..=max_steps {
            let route = ModelRouter::route_step(step);
            let system = prompts::system_prompt(task, &tree, threshold);
            let user = prompts::user_prompt(&task.goal, &tree, &steps, self.prompt_elements);
            debug!(step, model = %route.model, reason = %route.reason, "calling backend");

            let response = self.backend.call(route.model, &system, &user).await?;
            tokens = tokens.saturating_add(response.token_count);

            let Some(call) = parse_tool_call(&response.content) else {
                let answer = response.content.trim();
                let summary = if answer.is_empty() { DEFAULT_COMPLETE_SUMMARY } else { answer };
                info!(step, "no tool call, treating as completion");
                return Ok(AgentResult::finish(RunOutcome::ImplicitCompletion, summary, steps, tokens));
            };
            let kind = call.kind();
            // unknown tools are left for the dispatcher to reject
            let params = match kind {
                Some(_) => call.typed_params().map_err(|source| RuntimeError::InvalidParams {
                    tool: call.tool.clone(),
                    source,
                })?,
                None => ToolParams::default(),
            };

            let result = match kind {
                Some(BrowserTool::Complete | BrowserTool::Abort) => ActionResult::ok(),
                _ => dispatcher.dispatch(&call).await?,
            };
            debug!(step, tool = %call.tool, success = result.success, "step recorded");
            steps.push(AgentStep {
                step,
                tool: call.tool,
                params: call.params,
                result,
                reasoning: response.reasoning,
            });

            match kind {
                Some(BrowserTool::Complete) => {
                    let summary = params
                        .summary
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| DEFAULT_COMPLETE_SUMMARY.to_owned());
                    return Ok(AgentResult::finish(RunOutcome::Completed, summary, steps, tokens));
                }
                Some(BrowserTool::Abort) => {
                    let reason = params
                        .reason
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| DEFAULT_ABORT_REASON.to_owned());
                    return Ok(AgentResult::finish(RunOutcome::Aborted, reason, steps, tokens));
                }
                _ => {}
            }

            let confidence = params.confidence.unwrap_or(1.0);
            if confidence.is_nan() || confidence < threshold {
                warn!(step, confidence, threshold, "confidence below threshold, stopping");
                return Ok(AgentResult::finish(
                    RunOutcome::LowConfidence,
                    LOW_CONFIDENCE_SUMMARY,
                    steps,
                    tokens,
                ));
            }

            if let Some(fresh) = dispatcher.observe().await {
                tree = fresh;
            }
        }

        info!(max_steps, "step budget exhausted");
        Ok(AgentResult::finish(RunOutcome::MaxStepsReached, MAX_STEPS_SUMMARY, steps, tokens))
    }

    fn publish(&self, event: StreamEvent) {
        if let Some(relay) = &self.relay {
            let _ = relay.publish(event);
        }
    }
}
