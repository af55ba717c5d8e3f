//! # SSE framing
//!
//! Parser for `text/event-stream` bodies and the encoder the relay uses to
//! produce them. The parser handles:
//! - Line buffering across arbitrary chunk boundaries
//! - `data:` lines accumulated until the blank line that ends a frame
//! - `id:` and `event:` fields
//! - Comment lines (keep-alives)
//!
//! A frame cut off by the end of the stream is discarded.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::warn;

/// Comment frame sent to keep idle connections open.
pub const KEEP_ALIVE: &str = ": keep-alive\n\n";

/// One dispatched SSE frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Last `id:` field.
    pub id: Option<String>,
    /// `event:` field.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

#[derive(Default)]
struct FrameBuilder {
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameBuilder {
    /// Apply one line. Returns a frame when the line ends one.
    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.finish();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_owned()),
            "id" => self.id = Some(value.to_owned()),
            "event" => self.event = Some(value.to_owned()),
            _ => {}
        }
        None
    }

    fn finish(&mut self) -> Option<SseFrame> {
        let builder = std::mem::take(self);
        if builder.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            id: builder.id,
            event: builder.event,
            data: builder.data.join("\n"),
        })
    }
}

/// Parse SSE frames from a byte stream.
///
/// A read error ends the frame stream after a warning; the caller treats
/// the end of the stream as a dropped connection.
pub fn parse_sse_frames<S, E>(byte_stream: S) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: fmt::Display + Send + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), FrameBuilder::default()),
        |(mut stream, mut buffer, mut builder)| async move {
            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }
                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue;
                    };
                    if let Some(frame) = builder.line(line) {
                        return Some((frame, (stream, buffer, builder)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!(error = %e, "SSE stream read error");
                        return None;
                    }
                    None => return None,
                }
            }
        },
    )
}

/// Encode one frame. Multi-line data becomes several `data:` lines.
pub fn encode_frame(id: Option<u64>, data: &str) -> String {
    let mut out = String::with_capacity(data.len() + 16);
    if let Some(id) = id {
        out.push_str("id: ");
        out.push_str(&id.to_string());
        out.push('\n');
    }
    for line in data.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
