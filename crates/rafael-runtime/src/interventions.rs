//! Human-in-the-loop interventions.
//!
//! An `ask_user` step raises an [`Intervention`] for the run's browser
//! session and waits for someone to resolve it. Sessions created with
//! auto-approve answer every request immediately. An intervention nobody
//! answers within its timeout is marked [`InterventionStatus::Timeout`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rafael_core::clock::{SharedClock, system_clock};
use rafael_core::ids::{InterventionId, SessionId};
use rafael_settings::InterventionSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::InterventionError;

/// Response recorded on an intervention nobody answered.
pub const TIMEOUT_RESPONSE: &str = "No response - proceeding with default action";

/// Response recorded on auto-approved interventions.
pub const AUTO_APPROVED_RESPONSE: &str = "auto-approved";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// How a session handles interventions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolMode {
    /// A human answers every request.
    #[default]
    Manual,
    /// Every request is approved immediately.
    Auto,
    /// A human answers, with automatic fallbacks on timeout.
    Hybrid,
}

/// What an intervention asks for, inferred from its reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    /// Confirm an uncertain action.
    Confirmation,
    /// Grant a permission.
    Permission,
    /// Clarify the goal.
    Clarification,
    /// Recover from an error.
    ErrorRecovery,
    /// Anything else.
    General,
    /// Answered by an auto-approve session.
    AutoApproved,
}

impl InterventionType {
    /// Infer the type from a free-text reason.
    pub fn from_reason(reason: &str) -> Self {
        let reason = reason.to_lowercase();
        if reason.contains("confidence") {
            Self::Confirmation
        } else if reason.contains("error") {
            Self::ErrorRecovery
        } else if reason.contains("permission") {
            Self::Permission
        } else if reason.contains("clarification") {
            Self::Clarification
        } else {
            Self::General
        }
    }
}

/// Lifecycle of an intervention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    /// Waiting for an answer.
    Pending,
    /// Answered with approval.
    Approved,
    /// Answered with rejection.
    Rejected,
    /// Nobody answered in time.
    Timeout,
}

impl InterventionStatus {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for InterventionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request for human input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    /// Intervention id.
    pub id: InterventionId,
    /// Browser session it belongs to.
    pub session_id: SessionId,
    /// What is being asked.
    #[serde(rename = "type")]
    pub kind: InterventionType,
    /// Why input is needed; shown to the human.
    pub reason: String,
    /// Extra context for the human.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Suggested answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Current status.
    pub status: InterventionStatus,
    /// Creation time, ms since the Unix epoch.
    pub created_at: u64,
    /// Resolution time, ms since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<u64>,
    /// The answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// How long to wait for an answer, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Parameters for [`InterventionService::request`].
#[derive(Clone, Debug, Default)]
pub struct InterventionRequest {
    /// Browser session asking.
    pub session_id: SessionId,
    /// Why input is needed.
    pub reason: String,
    /// Extra context.
    pub context: Map<String, Value>,
    /// Suggested answers.
    pub options: Option<Vec<String>>,
    /// Wait budget; the service default when absent.
    pub timeout: Option<Duration>,
}

/// Per-session intervention state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HolSession {
    /// Browser session.
    pub session_id: SessionId,
    /// Handling mode.
    pub mode: HolMode,
    /// Whether requests are approved without asking.
    pub auto_approve: bool,
    /// Creation time, ms since the Unix epoch.
    pub created_at: u64,
    /// Interventions raised in this session, in order.
    pub interventions: Vec<InterventionId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks sessions and their interventions. Shared behind an `Arc`.
pub struct InterventionService {
    sessions: Mutex<HashMap<SessionId, HolSession>>,
    interventions: Mutex<HashMap<InterventionId, watch::Sender<Intervention>>>,
    default_timeout: Duration,
    auto_approve_all: bool,
    clock: SharedClock,
}

impl InterventionService {
    /// Service using the configured default timeout and auto-approve flag.
    pub fn new(settings: &InterventionSettings) -> Self {
        Self::with_clock(settings, system_clock())
    }

    /// Service stamping timestamps from `clock`.
    pub fn with_clock(settings: &InterventionSettings, clock: SharedClock) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            interventions: Mutex::new(HashMap::new()),
            default_timeout: settings.default_timeout(),
            auto_approve_all: settings.auto_approve,
            clock,
        }
    }

    /// Open (or replace) the intervention session for `session_id`.
    ///
    /// Requests are auto-approved when `auto_approve` is set, the mode is
    /// [`HolMode::Auto`], or the service is configured to approve everything.
    pub fn create_session(&self, session_id: SessionId, mode: HolMode, auto_approve: bool) -> HolSession {
        let session = HolSession {
            session_id: session_id.clone(),
            mode,
            auto_approve: auto_approve || mode == HolMode::Auto || self.auto_approve_all,
            created_at: self.clock.now_ms(),
            interventions: Vec::new(),
        };
        info!(session_id = %session_id, mode = ?mode, auto_approve = session.auto_approve, "intervention session created");
        let _ = self.sessions.lock().insert(session_id, session.clone());
        session
    }

    /// Raise an intervention.
    ///
    /// Auto-approve sessions get an already-approved
    /// [`InterventionType::AutoApproved`] intervention back.
    pub fn request(&self, request: InterventionRequest) -> Result<Intervention, InterventionError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&request.session_id)
            .ok_or_else(|| InterventionError::SessionNotFound(request.session_id.clone()))?;

        let now = self.clock.now_ms();
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let mut intervention = Intervention {
            id: InterventionId::new(),
            session_id: request.session_id,
            kind: InterventionType::from_reason(&request.reason),
            reason: request.reason,
            context: request.context,
            options: request.options,
            status: InterventionStatus::Pending,
            created_at: now,
            resolved_at: None,
            response: None,
            timeout: Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
        };
        if session.auto_approve {
            intervention.kind = InterventionType::AutoApproved;
            intervention.status = InterventionStatus::Approved;
            intervention.resolved_at = Some(now);
            intervention.response = Some(AUTO_APPROVED_RESPONSE.to_owned());
            intervention.timeout = None;
            debug!(id = %intervention.id, "intervention auto-approved");
        } else {
            info!(id = %intervention.id, kind = ?intervention.kind, reason = %intervention.reason, "intervention requested");
        }

        session.interventions.push(intervention.id.clone());
        let (tx, _) = watch::channel(intervention.clone());
        let _ = self.interventions.lock().insert(intervention.id.clone(), tx);
        Ok(intervention)
    }

    /// Answer a pending intervention.
    pub fn resolve(
        &self,
        id: &InterventionId,
        response: impl Into<String>,
        approved: bool,
    ) -> Result<Intervention, InterventionError> {
        let status = if approved {
            InterventionStatus::Approved
        } else {
            InterventionStatus::Rejected
        };
        let resolved = self.finish(id, status, response.into())?;
        info!(id = %id, status = %status, "intervention resolved");
        Ok(resolved)
    }

    /// Current state of one intervention.
    pub fn get(&self, id: &InterventionId) -> Option<Intervention> {
        self.interventions.lock().get(id).map(|tx| tx.borrow().clone())
    }

    /// Pending interventions for a session, oldest first.
    pub fn pending(&self, session_id: &SessionId) -> Vec<Intervention> {
        let mut pending: Vec<Intervention> = self
            .interventions
            .lock()
            .values()
            .map(|tx| tx.borrow().clone())
            .filter(|i| &i.session_id == session_id && i.status == InterventionStatus::Pending)
            .collect();
        pending.sort_by_key(|i| i.created_at);
        pending
    }

    /// Wait until the intervention is answered.
    ///
    /// Uses `timeout`, else the intervention's own timeout. When it elapses
    /// the intervention is marked [`InterventionStatus::Timeout`] and
    /// returned rather than failing.
    pub async fn wait(
        &self,
        id: &InterventionId,
        timeout: Option<Duration>,
    ) -> Result<Intervention, InterventionError> {
        let mut rx = self
            .interventions
            .lock()
            .get(id)
            .map(watch::Sender::subscribe)
            .ok_or_else(|| InterventionError::NotFound(id.clone()))?;

        let budget = timeout
            .or_else(|| rx.borrow().timeout.map(Duration::from_millis))
            .unwrap_or(self.default_timeout);

        let answered = tokio::time::timeout(
            budget,
            rx.wait_for(|i| i.status != InterventionStatus::Pending),
        )
        .await;
        match answered {
            Ok(Ok(intervention)) => Ok(intervention.clone()),
            // sender dropped without an answer
            Ok(Err(_)) => self.get(id).ok_or_else(|| InterventionError::NotFound(id.clone())),
            Err(_) => match self.finish(id, InterventionStatus::Timeout, TIMEOUT_RESPONSE.to_owned()) {
                Ok(expired) => {
                    warn!(id = %id, timeout_ms = budget.as_millis(), "intervention timed out");
                    Ok(expired)
                }
                // answered between the deadline and the update
                Err(InterventionError::NotPending { .. }) => {
                    self.get(id).ok_or_else(|| InterventionError::NotFound(id.clone()))
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Close a session. Its pending interventions are rejected so waiters
    /// wake up, then all of its interventions are forgotten.
    pub fn end_session(&self, session_id: &SessionId) -> bool {
        let Some(session) = self.sessions.lock().remove(session_id) else {
            return false;
        };
        for id in &session.interventions {
            let _ = self.finish(id, InterventionStatus::Rejected, "session ended".to_owned());
        }
        {
            let mut interventions = self.interventions.lock();
            for id in &session.interventions {
                let _ = interventions.remove(id);
            }
        }
        info!(session_id = %session_id, "intervention session ended");
        true
    }

    /// Session state, if open.
    pub fn session(&self, session_id: &SessionId) -> Option<HolSession> {
        self.sessions.lock().get(session_id).cloned()
    }

    fn finish(
        &self,
        id: &InterventionId,
        status: InterventionStatus,
        response: String,
    ) -> Result<Intervention, InterventionError> {
        let interventions = self.interventions.lock();
        let tx = interventions
            .get(id)
            .ok_or_else(|| InterventionError::NotFound(id.clone()))?;
        let current = tx.borrow().status;
        if current != InterventionStatus::Pending {
            return Err(InterventionError::NotPending {
                id: id.clone(),
                status: current,
            });
        }
        let now = self.clock.now_ms();
        tx.send_modify(|i| {
            i.status = status;
            i.response = Some(response);
            i.resolved_at = Some(now);
        });
        let updated = tx.borrow().clone();
        Ok(updated)
    }
}

impl fmt::Debug for InterventionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterventionService")
            .field("sessions", &self.sessions.lock().len())
            .field("interventions", &self.interventions.lock().len())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
