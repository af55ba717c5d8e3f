//! Reasoning backend seam.
//!
//! The loop treats the backend as an opaque `(variant, system, user) →
//! response` call. [`HttpBackend`] posts that triple to a task endpoint;
//! [`ScriptedBackend`] replays canned responses for tests and offline runs.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use rafael_core::routing::ModelVariant;
use rafael_core::text::truncate_str;
use rafael_settings::AgentSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::errors::BackendError;

/// One backend answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResponse {
    /// Raw output, expected to hold a JSON tool call.
    pub content: String,
    /// Reasoning text, if the backend exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Tokens consumed by this call.
    #[serde(default)]
    pub token_count: u64,
}

impl BackendResponse {
    /// Response carrying `content` and no token cost.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Response whose content is `call` serialized.
    pub fn tool_call(call: &Value, token_count: u64) -> Self {
        Self {
            content: call.to_string(),
            reasoning: None,
            token_count,
        }
    }
}

/// Reasoning backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask `model` for the next action.
    async fn call(
        &self,
        model: ModelVariant,
        system: &str,
        user: &str,
    ) -> Result<BackendResponse, BackendError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Backend reached over HTTP.
///
/// Posts `{model, system, user, maxTokens, temperature}` as JSON and expects
/// a [`BackendResponse`] back.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f64,
}

impl HttpBackend {
    /// Backend at `endpoint` using the sampling settings in `settings`.
    pub fn new(endpoint: impl Into<String>, settings: &AgentSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }

    /// Send `key` as a bearer token.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn call(
        &self,
        model: ModelVariant,
        system: &str,
        user: &str,
    ) -> Result<BackendResponse, BackendError> {
        let body = json!({
            "model": model,
            "system": system,
            "user": user,
            "maxTokens": self.max_tokens,
            "temperature": self.temperature,
        });
        debug!(model = %model, endpoint = %self.endpoint, "calling backend");

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), model = %model, "backend error");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: truncate_str(&body_text, 200).to_owned(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted
// ─────────────────────────────────────────────────────────────────────────────

/// One recorded call to a [`ScriptedBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendCall {
    /// Variant the loop routed to.
    pub model: ModelVariant,
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub user: String,
}

/// Backend that replays a fixed sequence of responses and records every call.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<BackendResponse>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl ScriptedBackend {
    /// Replay `responses` in order.
    pub fn new(responses: Vec<BackendResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::default(),
        }
    }

    /// Replay tool calls, each costing `tokens_per_call`.
    pub fn from_tool_calls(calls: &[Value], tokens_per_call: u64) -> Self {
        Self::new(
            calls
                .iter()
                .map(|c| BackendResponse::tool_call(c, tokens_per_call))
                .collect(),
        )
    }

    /// Script from a JSON array. Each entry is either a full response
    /// (`{"content": ...}`), a bare string used as content, or any other
    /// value used as a serialized tool call.
    pub fn from_json(text: &str) -> Result<Self, BackendError> {
        let entries: Vec<Value> =
            serde_json::from_str(text).map_err(|e| BackendError::Malformed(e.to_string()))?;
        let mut responses = Vec::with_capacity(entries.len());
        for entry in entries {
            let response = match entry {
                Value::String(content) => BackendResponse::text(content),
                Value::Object(ref obj) if obj.contains_key("content") => {
                    serde_json::from_value(entry)
                        .map_err(|e| BackendError::Malformed(e.to_string()))?
                }
                other => BackendResponse::tool_call(&other, 0),
            };
            responses.push(response);
        }
        Ok(Self::new(responses))
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Responses not yet handed out.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn call(
        &self,
        model: ModelVariant,
        system: &str,
        user: &str,
    ) -> Result<BackendResponse, BackendError> {
        let calls = {
            let mut calls = self.calls.lock();
            calls.push(BackendCall {
                model,
                system: system.to_owned(),
                user: user.to_owned(),
            });
            calls.len()
        };
        self.responses
            .lock()
            .pop_front()
            .ok_or(BackendError::ScriptExhausted { calls: calls - 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_replays_in_order_and_records() {
        let backend = ScriptedBackend::new(vec![
            BackendResponse::text("first"),
            BackendResponse::text("second"),
        ]);
        let a = backend.call(ModelVariant::ClaudeSonnet, "sys", "u1").await.unwrap();
        let b = backend.call(ModelVariant::ClaudeHaiku, "sys", "u2").await.unwrap();
        assert_eq!((a.content.as_str(), b.content.as_str()), ("first", "second"));

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].model, ModelVariant::ClaudeHaiku);
        assert_eq!(calls[1].user, "u2");
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test]
    async fn scripted_exhaustion_is_an_error() {
        let backend = ScriptedBackend::new(vec![BackendResponse::text("only")]);
        let _ = backend.call(ModelVariant::Kimi, "", "").await.unwrap();
        let err = backend.call(ModelVariant::Kimi, "", "").await.unwrap_err();
        assert!(matches!(err, BackendError::ScriptExhausted { calls: 1 }));
    }

    #[test]
    fn from_json_accepts_mixed_entries() {
        let backend = ScriptedBackend::from_json(
            r#"[
                {"tool": "read_page", "params": {}},
                {"content": "{\"tool\":\"complete\",\"params\":{}}", "reasoning": "done", "tokenCount": 12},
                "just text"
            ]"#,
        )
        .unwrap();
        let responses: Vec<BackendResponse> = backend.responses.lock().iter().cloned().collect();
        assert_eq!(responses[0].content, r#"{"params":{},"tool":"read_page"}"#);
        assert_eq!(responses[1].token_count, 12);
        assert_eq!(responses[1].reasoning.as_deref(), Some("done"));
        assert_eq!(responses[2].content, "just text");
    }

    #[test]
    fn from_json_rejects_non_array() {
        assert!(matches!(
            ScriptedBackend::from_json("{}"),
            Err(BackendError::Malformed(_))
        ));
    }
}
