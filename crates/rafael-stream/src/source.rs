//! Byte sources for a run's event stream.
//!
//! [`StreamSource`] is the seam between the reconnect state machine and the
//! wire. [`HttpStreamSource`] opens `GET {base}/api/v1/runs/{run_id}/stream`
//! with a bearer token; in-process sources (tests, a local relay) implement
//! the same trait.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use rafael_core::ids::RunId;
use rafael_core::text::truncate_str;
use rafael_settings::StreamSettings;
use reqwest::header::{ACCEPT, HeaderValue};
use tracing::{debug, error};

use crate::errors::{Result, TransportError};

/// Body of an open stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// What to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    /// Run whose events to follow.
    pub run_id: RunId,
    /// Bearer token authorizing the stream.
    pub token: String,
    /// Highest event index already seen, for resuming.
    pub last_index: Option<u64>,
}

/// Opens a run's event stream.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open one connection. The returned stream ending means the connection
    /// dropped.
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream>;
}

/// `reqwest`-backed source.
#[derive(Clone, Debug)]
pub struct HttpStreamSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStreamSource {
    /// Source against `base_url` (scheme, host and optional path prefix).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Source using an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Source configured from settings.
    pub fn from_settings(settings: &StreamSettings) -> Self {
        Self::new(settings.base_url.clone())
    }

    /// Stream URL for a run.
    pub fn stream_url(&self, run_id: &RunId) -> String {
        format!("{}/api/v1/runs/{run_id}/stream", self.base_url)
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream> {
        let url = self.stream_url(&request.run_id);
        debug!(url = %url, last_index = ?request.last_index, "opening event stream");

        let mut builder = self
            .client
            .get(&url)
            .bearer_auth(&request.token)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"));
        if let Some(index) = request.last_index {
            builder = builder.header("Last-Event-ID", index.to_string());
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "event stream rejected");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate_str(&body_text, 200).to_owned(),
            });
        }

        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(TransportError::Http)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_strips_trailing_slash() {
        let source = HttpStreamSource::new("http://127.0.0.1:3001/");
        let run = RunId::from("run_1");
        assert_eq!(
            source.stream_url(&run),
            "http://127.0.0.1:3001/api/v1/runs/run_1/stream"
        );
    }

    #[test]
    fn from_settings_uses_base_url() {
        let settings = StreamSettings {
            base_url: "https://rafael.example/edge".into(),
            ..StreamSettings::default()
        };
        let source = HttpStreamSource::from_settings(&settings);
        assert_eq!(
            source.stream_url(&RunId::from("r")),
            "https://rafael.example/edge/api/v1/runs/r/stream"
        );
    }
}
