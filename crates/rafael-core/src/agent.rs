//! Run-level types: steps, results and the request-layer boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{RunId, SessionId};
use crate::page::SemanticTree;
use crate::tools::ActionResult;

/// Whether the agent acts on the page or only guides the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Perform the actions.
    #[default]
    Execute,
    /// Show the user what to do.
    Guide,
}

impl AgentMode {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Guide => "guide",
        }
    }
}

/// One recorded step of a run. Steps are append-only and replayed into every
/// later prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    /// One-based step number.
    pub step: u32,
    /// Tool wire name as the backend produced it.
    pub tool: String,
    /// Raw parameters.
    pub params: Map<String, Value>,
    /// What happened when the step was dispatched.
    pub result: ActionResult,
    /// Backend reasoning text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The backend called `complete`.
    Completed,
    /// The backend answered without a tool call.
    ImplicitCompletion,
    /// The backend called `abort`.
    Aborted,
    /// A step's confidence fell below the threshold.
    LowConfidence,
    /// The step budget ran out.
    MaxStepsReached,
}

impl RunOutcome {
    /// Whether the outcome counts as success.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Completed | Self::ImplicitCompletion)
    }
}

/// Final result of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    /// Whether the goal was reached.
    pub success: bool,
    /// Completion summary or failure reason.
    pub summary: String,
    /// Every step taken, in order.
    pub steps: Vec<AgentStep>,
    /// Tokens reported by the backend across all calls.
    pub token_count: u64,
    /// Terminal state.
    pub outcome: RunOutcome,
}

impl AgentResult {
    /// Result for a terminal outcome; `success` follows the outcome.
    pub fn finish(
        outcome: RunOutcome,
        summary: impl Into<String>,
        steps: Vec<AgentStep>,
        token_count: u64,
    ) -> Self {
        Self {
            success: outcome.is_success(),
            summary: summary.into(),
            steps,
            token_count,
            outcome,
        }
    }
}

/// A run request as submitted by the page snippet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    /// Natural-language goal.
    pub goal: String,
    /// Snapshot taken when the request was made.
    #[serde(default)]
    pub dom_snapshot: Option<SemanticTree>,
    /// Browser session.
    pub session_id: String,
    /// End user.
    pub user_id: String,
    /// Execution mode.
    #[serde(default)]
    pub mode: AgentMode,
}

/// A validated request bound to a run and an app.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    /// Issued run id.
    pub run_id: RunId,
    /// Natural-language goal.
    pub goal: String,
    /// Snapshot taken when the request was made.
    #[serde(default)]
    pub dom_snapshot: Option<SemanticTree>,
    /// Browser session.
    pub session_id: SessionId,
    /// End user.
    pub user_id: String,
    /// App derived from the app key.
    pub app_id: String,
    /// Owning organization, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Execution mode.
    pub mode: AgentMode,
}

/// What the launcher hands back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTicket {
    /// Issued run id.
    pub run_id: RunId,
    /// Short-lived token authorizing the event stream.
    pub public_token: String,
    /// Path of the run's event stream.
    pub stream_url: String,
}
