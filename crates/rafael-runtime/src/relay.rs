//! Publisher side of a run's event stream.
//!
//! [`EventRelay`] stamps every published event with the next index, keeps
//! the full history so a reconnecting subscriber can resume after its last
//! seen index, and fans events out to live subscribers over a broadcast
//! channel. [`EventRelay::sse_stream`] renders one subscriber's view as SSE
//! frames.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use rafael_core::events::{StreamEvent, StreamEventKind};
use rafael_core::ids::RunId;
use rafael_stream::sse::encode_frame;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Live events buffered per subscriber before it starts lagging.
pub const BROADCAST_CAPACITY: usize = 256;

struct RelayState {
    next_index: u64,
    history: Vec<StreamEvent>,
    tx: Option<broadcast::Sender<StreamEvent>>,
}

/// Replayed history plus the live feed that continues it.
pub struct Subscription {
    /// Events already published after the requested index.
    pub backlog: Vec<StreamEvent>,
    /// Live events; `None` once the relay is closed.
    pub live: Option<broadcast::Receiver<StreamEvent>>,
}

/// Indexed, replayable event feed for one run.
pub struct EventRelay {
    run_id: RunId,
    state: Mutex<RelayState>,
}

impl EventRelay {
    /// Empty relay for `run_id`.
    pub fn new(run_id: RunId) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            run_id,
            state: Mutex::new(RelayState {
                next_index: 0,
                history: Vec::new(),
                tx: Some(tx),
            }),
        }
    }

    /// Run this relay belongs to.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Publish an event, returning the index assigned to it. Any index the
    /// event already carried is replaced.
    pub fn publish(&self, mut event: StreamEvent) -> u64 {
        let mut state = self.state.lock();
        let index = state.next_index;
        state.next_index += 1;
        event.index = Some(index);
        state.history.push(event.clone());
        debug!(run_id = %self.run_id, index, kind = %event.kind, "event published");
        if let Some(tx) = &state.tx {
            // no live subscribers is fine; history covers late joiners
            let _ = tx.send(event);
        }
        index
    }

    /// Every event published so far.
    pub fn history(&self) -> Vec<StreamEvent> {
        self.state.lock().history.clone()
    }

    /// Events with an index above `after` (all of them for `None`).
    pub fn since(&self, after: Option<u64>) -> Vec<StreamEvent> {
        let state = self.state.lock();
        let start = after.map_or(0, |i| usize::try_from(i.saturating_add(1)).unwrap_or(usize::MAX));
        state.history.get(start..).map(<[StreamEvent]>::to_vec).unwrap_or_default()
    }

    /// Number of published events.
    pub fn len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Whether nothing was published yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backlog after `after` and a live receiver, taken atomically so no
    /// event is missed or duplicated between the two.
    pub fn subscribe(&self, after: Option<u64>) -> Subscription {
        let state = self.state.lock();
        let start = after.map_or(0, |i| usize::try_from(i.saturating_add(1)).unwrap_or(usize::MAX));
        Subscription {
            backlog: state.history.get(start..).map(<[StreamEvent]>::to_vec).unwrap_or_default(),
            live: state.tx.as_ref().map(broadcast::Sender::subscribe),
        }
    }

    /// Stop accepting subscribers to the live feed. Open SSE streams end
    /// after draining what was already published.
    pub fn close(&self) {
        if self.state.lock().tx.take().is_some() {
            debug!(run_id = %self.run_id, "event relay closed");
        }
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().tx.is_none()
    }

    /// SSE body for a subscriber that has seen everything up to `after`.
    ///
    /// Each event is one frame with `id:` set to its index. The stream ends
    /// after a `complete` event or when the relay is closed and drained. A
    /// subscriber that falls behind the broadcast buffer is caught up from
    /// history.
    pub fn sse_stream(self: &Arc<Self>, after: Option<u64>) -> impl Stream<Item = Bytes> + Send + 'static {
        let Subscription { backlog, live } = self.subscribe(after);
        let feed = Feed {
            relay: Arc::clone(self),
            backlog: backlog.into(),
            live,
            last_sent: after,
            done: false,
        };
        futures::stream::unfold(feed, |mut feed| async move {
            let event = feed.next_event().await?;
            let frame = match serde_json::to_string(&event) {
                Ok(json) => encode_frame(event.index, &json),
                Err(e) => {
                    warn!(error = %e, "unserializable stream event");
                    String::new()
                }
            };
            Some((Bytes::from(frame), feed))
        })
    }
}

struct Feed {
    relay: Arc<EventRelay>,
    backlog: VecDeque<StreamEvent>,
    live: Option<broadcast::Receiver<StreamEvent>>,
    last_sent: Option<u64>,
    done: bool,
}

impl Feed {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.done {
            return None;
        }
        loop {
            let event = if let Some(event) = self.backlog.pop_front() {
                event
            } else {
                let rx = self.live.as_mut()?;
                match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(run_id = %self.relay.run_id, skipped, "subscriber lagged, replaying from history");
                        self.backlog = self.relay.since(self.last_sent).into();
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        self.live = None;
                        continue;
                    }
                }
            };
            if let (Some(seen), Some(index)) = (self.last_sent, event.index) {
                if index <= seen {
                    continue;
                }
            }
            self.last_sent = event.index.or(self.last_sent);
            self.done = event.kind == StreamEventKind::Complete;
            return Some(event);
        }
    }
}
