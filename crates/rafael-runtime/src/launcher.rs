//! Run admission.
//!
//! [`RunLauncher`] is the boundary with the request layer: it validates a run
//! request, derives the app from the app key, and issues a run id plus a
//! short-lived public token for the run's event stream. Tokens live in a TTL
//! cache; [`RunLauncher::authorize_stream`] only honors live ones.

use std::time::Duration;

use parking_lot::Mutex;
use rafael_core::agent::{AgentRequest, AgentTask, RunTicket};
use rafael_core::cache::TtlCache;
use rafael_core::clock::{SharedClock, system_clock};
use rafael_core::constants::APP_KEY_PREFIX;
use rafael_core::ids::{PublicToken, RunId, SessionId};
use rafael_settings::CacheSettings;
use tracing::{debug, info, warn};

use crate::errors::LaunchError;

/// An admitted run: the caller's ticket and the task to execute.
#[derive(Clone, Debug, PartialEq)]
pub struct Launch {
    /// Returned to the caller.
    pub ticket: RunTicket,
    /// Handed to the orchestration loop.
    pub task: AgentTask,
}

/// Issues runs and stream tokens.
pub struct RunLauncher {
    tokens: Mutex<TtlCache<RunId>>,
}

impl RunLauncher {
    /// Launcher whose tokens live for the configured cache TTL.
    pub fn new(settings: &CacheSettings) -> Self {
        Self::with_clock(settings.ttl(), system_clock())
    }

    /// Launcher with an explicit token TTL and clock.
    pub fn with_clock(ttl: Duration, clock: SharedClock) -> Self {
        Self {
            tokens: Mutex::new(TtlCache::new(ttl, clock)),
        }
    }

    /// Admit a run request.
    ///
    /// `app_key` is the raw app key header. The app id is the key without
    /// its `rafael_` prefix.
    pub fn launch(&self, request: AgentRequest, app_key: Option<&str>) -> Result<Launch, LaunchError> {
        let app_id = app_id(app_key)?;
        if request.goal.trim().is_empty() {
            return Err(LaunchError::InvalidRequest("goal"));
        }
        if request.session_id.trim().is_empty() {
            return Err(LaunchError::InvalidRequest("sessionId"));
        }
        if request.user_id.trim().is_empty() {
            return Err(LaunchError::InvalidRequest("userId"));
        }

        let run_id = RunId::new();
        let token = PublicToken::new().into_inner();
        self.tokens.lock().set(token.clone(), run_id.clone());
        info!(run_id = %run_id, app_id = %app_id, mode = request.mode.as_str(), "run launched");

        let ticket = RunTicket {
            run_id: run_id.clone(),
            public_token: token,
            stream_url: stream_path(&run_id),
        };
        let task = AgentTask {
            run_id,
            goal: request.goal,
            dom_snapshot: request.dom_snapshot,
            session_id: SessionId::from(request.session_id),
            user_id: request.user_id,
            app_id,
            org_id: None,
            mode: request.mode,
        };
        Ok(Launch { ticket, task })
    }

    /// Run a stream token authorizes, while the token is live.
    pub fn authorize_stream(&self, token: &str) -> Option<RunId> {
        let run = self.tokens.lock().get(token);
        if run.is_none() {
            warn!("stream token rejected");
        }
        run
    }

    /// Invalidate a token early.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.tokens.lock().remove(token).is_some();
        debug!(removed, "stream token revoked");
        removed
    }

    /// Drop expired tokens.
    pub fn cleanup(&self) {
        self.tokens.lock().cleanup();
    }
}

/// Path of a run's event stream, relative to the server base URL.
pub fn stream_path(run_id: &RunId) -> String {
    format!("/api/v1/runs/{run_id}/stream")
}

fn app_id(app_key: Option<&str>) -> Result<String, LaunchError> {
    let key = app_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| LaunchError::Unauthorized("Missing X-App-Key header".into()))?;
    let app = key.strip_prefix(APP_KEY_PREFIX).unwrap_or(key);
    if app.is_empty() {
        return Err(LaunchError::Unauthorized("app key names no app".into()));
    }
    Ok(app.to_owned())
}
