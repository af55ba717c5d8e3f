//! In-process stream endpoint.
//!
//! [`RelayHub`] keeps one [`EventRelay`] per live run and serves them through
//! the same [`StreamSource`] seam the HTTP client uses, checking the bearer
//! token against the [`RunLauncher`] first. A `RealtimeClient` pointed at a
//! hub behaves exactly as it would against the HTTP endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use rafael_core::ids::RunId;
use rafael_stream::{ByteStream, StreamRequest, StreamSource, TransportError};
use tracing::debug;

use crate::launcher::RunLauncher;
use crate::relay::EventRelay;

/// Registry of live run relays.
pub struct RelayHub {
    launcher: Arc<RunLauncher>,
    relays: Mutex<HashMap<RunId, Arc<EventRelay>>>,
}

impl RelayHub {
    /// Hub authorizing streams with `launcher`.
    pub fn new(launcher: Arc<RunLauncher>) -> Self {
        Self {
            launcher,
            relays: Mutex::new(HashMap::new()),
        }
    }

    /// Relay for `run_id`, created on first use.
    pub fn relay(&self, run_id: &RunId) -> Arc<EventRelay> {
        Arc::clone(
            self.relays
                .lock()
                .entry(run_id.clone())
                .or_insert_with(|| Arc::new(EventRelay::new(run_id.clone()))),
        )
    }

    /// Relay for `run_id`, if registered.
    pub fn get(&self, run_id: &RunId) -> Option<Arc<EventRelay>> {
        self.relays.lock().get(run_id).cloned()
    }

    /// Close and forget a run's relay.
    pub fn remove(&self, run_id: &RunId) -> bool {
        let Some(relay) = self.relays.lock().remove(run_id) else {
            return false;
        };
        relay.close();
        true
    }
}

#[async_trait]
impl StreamSource for RelayHub {
    async fn open(&self, request: &StreamRequest) -> rafael_stream::Result<ByteStream> {
        match self.launcher.authorize_stream(&request.token) {
            Some(run) if run == request.run_id => {}
            _ => {
                return Err(TransportError::Status {
                    status: 401,
                    body: "invalid or expired stream token".into(),
                });
            }
        }
        let relay = self.get(&request.run_id).ok_or_else(|| TransportError::Status {
            status: 404,
            body: format!("run not found: {}", request.run_id),
        })?;
        debug!(run_id = %request.run_id, last_index = ?request.last_index, "serving relay stream");
        Ok(Box::pin(relay.sse_stream(request.last_index).map(Ok)))
    }
}
