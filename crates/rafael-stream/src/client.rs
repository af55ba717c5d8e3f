//! Reconnecting event stream client.
//!
//! [`RealtimeClient`] follows one run's stream. A background task opens the
//! [`StreamSource`], decodes frames into [`StreamEvent`]s and hands them to
//! registered handlers in receipt order. When the connection fails or ends it
//! waits `base · 2^attempt` and reconnects; a successful open resets the
//! attempt counter. Once the attempt budget is spent the client moves to
//! [`ConnectionState::Failed`] and emits one synthetic fatal `error` event.
//!
//! State machine:
//! ```text
//! Idle → Connecting → Open → (Error → Reconnecting → Connecting)* → Closed | Failed
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use rafael_core::events::{StreamEvent, StreamEventKind};
use rafael_core::ids::RunId;
use rafael_core::retry::BackoffPolicy;
use rafael_core::text::truncate_str;
use rafael_settings::StreamSettings;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::source::{ByteStream, StreamRequest, StreamSource};
use crate::sse::{self, SseFrame};

/// Message carried by the synthetic terminal event.
pub const RECONNECT_EXHAUSTED: &str = "Max reconnection attempts reached";

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// Connection lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// Opening a connection.
    Connecting,
    /// Receiving events.
    Open,
    /// The connection failed or ended.
    Error,
    /// Waiting before the next attempt.
    Reconnecting {
        /// Attempt about to be made, starting at 1.
        attempt: u32,
        /// Backoff before it.
        delay_ms: u64,
    },
    /// Stopped by [`RealtimeClient::disconnect`] or by the run completing.
    Closed,
    /// Reconnect attempts exhausted.
    Failed,
}

impl ConnectionState {
    /// Whether the client will not connect again on its own.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Which events a handler receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Events of one type.
    Kind(StreamEventKind),
    /// Every event.
    All,
}

impl Channel {
    fn matches(self, kind: StreamEventKind) -> bool {
        match self {
            Self::Kind(k) => k == kind,
            Self::All => true,
        }
    }
}

impl From<StreamEventKind> for Channel {
    fn from(kind: StreamEventKind) -> Self {
        Self::Kind(kind)
    }
}

/// Registration handle returned by [`RealtimeClient::on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

struct Registration {
    id: HandlerId,
    channel: Channel,
    handler: Handler,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

struct Inner {
    source: Arc<dyn StreamSource>,
    run_id: RunId,
    token: String,
    policy: BackoffPolicy,
    handlers: Mutex<Vec<Registration>>,
    next_handler: AtomicU64,
    watermark: Mutex<Option<u64>>,
    state: watch::Sender<ConnectionState>,
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Subscriber to one run's event stream.
pub struct RealtimeClient {
    inner: Arc<Inner>,
    session: Mutex<Option<Session>>,
}

enum PumpEnd {
    Dropped,
    Completed,
    Cancelled,
}

impl RealtimeClient {
    /// Client for `run_id` authorized by `token`.
    pub fn new(
        source: Arc<dyn StreamSource>,
        run_id: RunId,
        token: impl Into<String>,
        policy: BackoffPolicy,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            inner: Arc::new(Inner {
                source,
                run_id,
                token: token.into(),
                policy,
                handlers: Mutex::new(Vec::new()),
                next_handler: AtomicU64::new(1),
                watermark: Mutex::new(None),
                state,
            }),
            session: Mutex::new(None),
        }
    }

    /// Client using the backoff configured in `settings`.
    pub fn from_settings(
        source: Arc<dyn StreamSource>,
        run_id: RunId,
        token: impl Into<String>,
        settings: &StreamSettings,
    ) -> Self {
        Self::new(source, run_id, token, settings.backoff())
    }

    /// Start following the stream. Does nothing while already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut session = self.session.lock();
        if session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        self.inner.set_state(ConnectionState::Connecting);
        let task = tokio::spawn(Arc::clone(&self.inner).run(cancel.clone()));
        *session = Some(Session { cancel, task });
    }

    /// Stop following the stream.
    ///
    /// Delivery stops immediately and any pending reconnect is abandoned.
    /// Calling it again, or before [`connect`](Self::connect), is harmless.
    pub fn disconnect(&self) {
        if let Some(session) = self.session.lock().take() {
            session.cancel.cancel();
            session.task.abort();
            debug!(run_id = %self.inner.run_id, "event stream disconnected");
        }
        let _ = self.inner.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });
    }

    /// Register `handler` for `channel`.
    pub fn on<F>(&self, channel: impl Into<Channel>, handler: F) -> HandlerId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.inner.next_handler.fetch_add(1, Ordering::Relaxed));
        self.inner.handlers.lock().push(Registration {
            id,
            channel: channel.into(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a handler. Returns whether it was registered on `channel`.
    pub fn off(&self, channel: impl Into<Channel>, id: HandlerId) -> bool {
        let channel = channel.into();
        let mut handlers = self.inner.handlers.lock();
        let before = handlers.len();
        handlers.retain(|r| !(r.id == id && r.channel == channel));
        handlers.len() != before
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Highest event index seen so far.
    pub fn last_index(&self) -> Option<u64> {
        *self.inner.watermark.lock()
    }

    /// Run being followed.
    pub fn run_id(&self) -> &RunId {
        &self.inner.run_id
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
            session.task.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Background task
// ─────────────────────────────────────────────────────────────────────────────

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        let _ = self.state.send_replace(next);
    }

    /// State change from the background task. Checked under the channel
    /// lock so nothing overwrites the `Closed` set by a disconnect.
    fn transition(&self, cancel: &CancellationToken, next: ConnectionState) {
        let _ = self.state.send_if_modified(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            *state = next;
            true
        });
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut attempt: u32 = 0;
        loop {
            self.transition(&cancel, ConnectionState::Connecting);
            let request = StreamRequest {
                run_id: self.run_id.clone(),
                token: self.token.clone(),
                last_index: *self.watermark.lock(),
            };
            let opened = tokio::select! {
                () = cancel.cancelled() => return,
                opened = self.source.open(&request) => opened,
            };

            match opened {
                Ok(body) => {
                    attempt = 0;
                    self.transition(&cancel, ConnectionState::Open);
                    info!(run_id = %self.run_id, "event stream open");
                    match self.pump(body, &cancel).await {
                        PumpEnd::Cancelled => return,
                        PumpEnd::Completed => {
                            info!(run_id = %self.run_id, "run completed, closing event stream");
                            self.transition(&cancel, ConnectionState::Closed);
                            return;
                        }
                        PumpEnd::Dropped => warn!(run_id = %self.run_id, "event stream ended"),
                    }
                }
                Err(e) => warn!(
                    run_id = %self.run_id,
                    attempt,
                    retryable = e.is_retryable(),
                    error = %e,
                    "event stream connect failed"
                ),
            }

            self.transition(&cancel, ConnectionState::Error);
            if !self.policy.can_retry(attempt) {
                error!(run_id = %self.run_id, attempts = attempt, "reconnect attempts exhausted");
                self.transition(&cancel, ConnectionState::Failed);
                self.dispatch(&StreamEvent::fatal_error(RECONNECT_EXHAUSTED), &cancel);
                return;
            }
            let delay = self.policy.delay_for(attempt);
            attempt += 1;
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            self.transition(&cancel, ConnectionState::Reconnecting { attempt, delay_ms });
            debug!(run_id = %self.run_id, attempt, delay_ms, "reconnect scheduled");
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn pump(&self, body: ByteStream, cancel: &CancellationToken) -> PumpEnd {
        let mut frames = std::pin::pin!(sse::parse_sse_frames(body));
        loop {
            let frame = tokio::select! {
                () = cancel.cancelled() => return PumpEnd::Cancelled,
                frame = frames.next() => frame,
            };
            let Some(frame) = frame else {
                return PumpEnd::Dropped;
            };
            let Some(event) = self.decode(&frame) else {
                continue;
            };
            self.dispatch(&event, cancel);
            if event.kind == StreamEventKind::Complete {
                return PumpEnd::Completed;
            }
        }
    }

    /// Parse a frame and advance the watermark. Frames that are not a valid
    /// event envelope are dropped; `data` is passed through as received.
    fn decode(&self, frame: &SseFrame) -> Option<StreamEvent> {
        let mut event: StreamEvent = match serde_json::from_str(&frame.data) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    run_id = %self.run_id,
                    error = %e,
                    data_preview = truncate_str(&frame.data, 100),
                    "dropping malformed stream event"
                );
                return None;
            }
        };
        if event.index.is_none() {
            event.index = frame.id.as_deref().and_then(|id| id.parse().ok());
        }
        if let Some(index) = event.index {
            let mut watermark = self.watermark.lock();
            match *watermark {
                Some(seen) if index <= seen => {
                    debug!(run_id = %self.run_id, index, watermark = seen, "out-of-order stream event");
                }
                _ => *watermark = Some(index),
            }
        }
        Some(event)
    }

    fn dispatch(&self, event: &StreamEvent, cancel: &CancellationToken) {
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .iter()
            .filter(|r| r.channel.matches(event.kind))
            .map(|r| Arc::clone(&r.handler))
            .collect();
        for handler in handlers {
            if cancel.is_cancelled() {
                return;
            }
            handler(event);
        }
    }
}
