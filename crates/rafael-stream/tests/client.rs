//! Reconnect state machine against scripted sources, on a paused clock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rafael_core::events::{EventPayload, StreamEvent, StreamEventKind};
use rafael_core::ids::RunId;
use rafael_core::logging::capture_logs;
use rafael_core::retry::BackoffPolicy;
use rafael_stream::{
    ByteStream, Channel, ConnectionState, RealtimeClient, StreamRequest, StreamSource,
    TransportError,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::Level;

// ─── Scripted source ─────────────────────────────────────────────────────

enum Script {
    /// Refuse the connection.
    Fail,
    /// Serve these chunks, then end the stream.
    Serve(Vec<String>),
    /// Serve these chunks, then stay open.
    Hold(Vec<String>),
}

#[derive(Default)]
struct ScriptedSource {
    scripts: Mutex<VecDeque<Script>>,
    opens: Mutex<Vec<(Instant, StreamRequest)>>,
}

impl ScriptedSource {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            opens: Mutex::default(),
        })
    }

    fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().iter().map(|(t, _)| *t).collect()
    }

    fn requests(&self) -> Vec<StreamRequest> {
        self.opens.lock().iter().map(|(_, r)| r.clone()).collect()
    }
}

fn chunks(list: Vec<String>) -> impl futures::Stream<Item = rafael_stream::Result<Bytes>> {
    futures::stream::iter(list.into_iter().map(|c| Ok(Bytes::from(c))))
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn open(&self, request: &StreamRequest) -> rafael_stream::Result<ByteStream> {
        self.opens.lock().push((Instant::now(), request.clone()));
        let script = self.scripts.lock().pop_front().unwrap_or(Script::Fail);
        match script {
            Script::Fail => Err(TransportError::Status {
                status: 503,
                body: "unavailable".into(),
            }),
            Script::Serve(list) => Ok(Box::pin(chunks(list))),
            Script::Hold(list) => {
                use futures::StreamExt;
                Ok(Box::pin(chunks(list).chain(futures::stream::pending())))
            }
        }
    }
}

fn frame(event: &StreamEvent) -> String {
    format!("data: {}\n\n", serde_json::to_string(event).unwrap())
}

fn client(source: &Arc<ScriptedSource>) -> RealtimeClient {
    RealtimeClient::new(
        source.clone(),
        RunId::from("run_test"),
        "tok",
        BackoffPolicy::default(),
    )
}

fn collect(client: &RealtimeClient, channel: impl Into<Channel>) -> mpsc::UnboundedReceiver<StreamEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = client.on(channel, move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

async fn wait_until(client: &RealtimeClient, pred: impl Fn(&ConnectionState) -> bool) {
    let mut rx = client.watch_state();
    let _ = rx.wait_for(|s| pred(s)).await.unwrap();
}

fn drain(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

// ─── Backoff ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn backoff_doubles_then_fails() {
    let source = ScriptedSource::new(vec![]);
    let client = client(&source);
    let mut all = collect(&client, Channel::All);

    client.connect();
    wait_until(&client, |s| *s == ConnectionState::Failed).await;

    let times = source.open_times();
    assert_eq!(times.len(), 6, "initial attempt plus five retries");
    let gaps: Vec<u128> = times.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
    assert_eq!(gaps, vec![1000, 2000, 4000, 8000, 16000]);

    let events = drain(&mut all);
    assert_eq!(events.len(), 1);
    assert!(events[0].is_fatal());
    assert_matches!(events[0].payload().unwrap(), EventPayload::Error { fatal: true, .. });
}

#[tokio::test(start_paused = true)]
async fn failed_is_terminal() {
    let source = ScriptedSource::new(vec![]);
    let client = client(&source);
    client.connect();
    wait_until(&client, |s| *s == ConnectionState::Failed).await;

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(source.open_times().len(), 6);
    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_the_counter() {
    let source = ScriptedSource::new(vec![
        Script::Fail,
        Script::Fail,
        Script::Serve(vec![frame(&StreamEvent::message("hello"))]),
        Script::Fail,
    ]);
    let client = client(&source);
    client.connect();
    wait_until(&client, |_| source.open_times().len() == 4).await;

    let times = source.open_times();
    let gaps: Vec<u128> = times.windows(2).map(|w| (w[1] - w[0]).as_millis()).collect();
    assert_eq!(gaps, vec![1000, 2000, 1000]);
    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_backoff_cancels_the_retry() {
    let source = ScriptedSource::new(vec![]);
    let client = client(&source);
    client.connect();
    wait_until(&client, |s| matches!(s, ConnectionState::Reconnecting { .. })).await;

    client.disconnect();
    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Closed);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(source.open_times().len(), 1);
    assert_eq!(client.state(), ConnectionState::Closed);
}

// ─── Dispatch ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn events_reach_typed_and_catch_all_handlers() {
    let source = ScriptedSource::new(vec![Script::Hold(vec![
        frame(&StreamEvent::message("starting").with_index(1)),
        frame(&StreamEvent::ask_user("Which plan?", &["Free".into(), "Pro".into()]).with_index(2)),
    ])]);
    let client = client(&source);
    let mut all = collect(&client, Channel::All);
    let mut asks = collect(&client, StreamEventKind::AskUser);

    client.connect();
    let first = all.recv().await.unwrap();
    let second = all.recv().await.unwrap();
    assert_eq!(first.kind, StreamEventKind::Message);
    assert_eq!(second.kind, StreamEventKind::AskUser);

    let asked = drain(&mut asks);
    assert_eq!(asked.len(), 1);
    assert_matches!(
        asked[0].payload().unwrap(),
        EventPayload::AskUser { ref question, ref options } if question == "Which plan?" && options.len() == 2
    );
    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(client.last_index(), Some(2));
    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn malformed_events_are_dropped_with_a_warning() {
    let (logs, _guard) = capture_logs();
    let source = ScriptedSource::new(vec![Script::Hold(vec![
        "data: {not json\n\n".into(),
        "data: {\"type\":\"teleport\",\"data\":{}}\n\n".into(),
        "data: {\"type\":\"message\",\"data\":[1,2]}\n\n".into(),
        frame(&StreamEvent::message("after")),
    ])]);
    let client = client(&source);
    let mut all = collect(&client, Channel::All);

    client.connect();
    let only = all.recv().await.unwrap();

    assert_matches!(only.payload().unwrap(), EventPayload::Message { ref message } if message == "after");
    assert!(drain(&mut all).is_empty());
    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(source.open_times().len(), 1);
    assert!(logs.has_event(Level::WARN, "dropping malformed stream event"));
    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn unexpected_data_fields_are_still_delivered() {
    let source = ScriptedSource::new(vec![Script::Hold(vec![
        "data: {\"type\":\"message\",\"index\":1,\"data\":{\"message\":42}}\n\n".into(),
        "data: {\"type\":\"error\",\"index\":2,\"data\":{\"message\":{\"code\":500}}}\n\n".into(),
        frame(&StreamEvent::message("ok").with_index(3)),
    ])]);
    let client = client(&source);
    let mut all = collect(&client, Channel::All);
    let mut errors = collect(&client, StreamEventKind::Error);

    client.connect();
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(all.recv().await.unwrap());
    }

    let indices: Vec<_> = seen.iter().map(|e| e.index).collect();
    assert_eq!(indices, [Some(1), Some(2), Some(3)]);
    assert_eq!(seen[0].data["message"], 42);
    assert!(seen[0].payload().is_err());
    assert_eq!(drain(&mut errors).len(), 1);
    assert_eq!(client.last_index(), Some(3));
    assert_eq!(client.state(), ConnectionState::Open);
    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn lower_index_is_still_dispatched() {
    let source = ScriptedSource::new(vec![Script::Hold(vec![
        frame(&StreamEvent::message("five").with_index(5)),
        frame(&StreamEvent::message("three").with_index(3)),
    ])]);
    let client = client(&source);
    let mut all = collect(&client, Channel::All);

    client.connect();
    let a = all.recv().await.unwrap();
    let b = all.recv().await.unwrap();
    assert_eq!((a.index, b.index), (Some(5), Some(3)));
    assert_eq!(client.last_index(), Some(5));
    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn reconnect_resumes_from_watermark() {
    let source = ScriptedSource::new(vec![
        Script::Serve(vec![frame(&StreamEvent::message("one").with_index(4))]),
        Script::Hold(vec![]),
    ]);
    let client = client(&source);
    client.connect();
    wait_until(&client, |_| source.open_times().len() == 2).await;
    let requests = source.requests();
    assert_eq!(requests[0].last_index, None);
    assert_eq!(requests[1].last_index, Some(4));
    assert_eq!(requests[1].token, "tok");
    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn sse_id_fills_missing_index() {
    let source = ScriptedSource::new(vec![Script::Hold(vec![
        "id: 9\ndata: {\"type\":\"message\",\"data\":{\"message\":\"m\"}}\n\n".into(),
    ])]);
    let client = client(&source);
    let mut all = collect(&client, Channel::All);
    client.connect();
    let ev = all.recv().await.unwrap();
    assert_eq!(ev.index, Some(9));
    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn complete_closes_the_stream() {
    let source = ScriptedSource::new(vec![Script::Hold(vec![frame(&StreamEvent::complete(
        "logged in",
    ))])]);
    let client = client(&source);
    let mut completes = collect(&client, StreamEventKind::Complete);
    client.connect();
    wait_until(&client, |s| *s == ConnectionState::Closed).await;
    assert_eq!(drain(&mut completes).len(), 1);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.open_times().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn off_removes_only_that_handler() {
    let source = ScriptedSource::new(vec![Script::Hold(vec![frame(&StreamEvent::message("x"))])]);
    let client = client(&source);
    let (tx, mut removed) = mpsc::unbounded_channel::<StreamEvent>();
    let id = client.on(Channel::All, move |e| {
        let _ = tx.send(e.clone());
    });
    let mut kept = collect(&client, Channel::All);

    assert!(!client.off(StreamEventKind::Message, id));
    assert!(client.off(Channel::All, id));

    client.connect();
    let _ = kept.recv().await.unwrap();
    assert!(removed.try_recv().is_err());
    client.disconnect();
}

#[tokio::test(start_paused = true)]
async fn disconnect_before_connect_is_harmless() {
    let source = ScriptedSource::new(vec![]);
    let client = client(&source);
    assert_eq!(client.state(), ConnectionState::Idle);
    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(source.open_times().is_empty());
}
