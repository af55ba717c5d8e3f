//! Stream event wire format.
//!
//! Every event on a run's stream is `{type, index?, data}`. The `data` object
//! is kept raw so forwarding is lossless; [`StreamEvent::payload`] gives the
//! typed view consumers match on exhaustively.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::tools::ToolCall;

/// Event type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    /// The agent wants a tool executed on the page.
    Action,
    /// The run finished successfully.
    Complete,
    /// The run (or the stream) failed.
    Error,
    /// The agent needs an answer from the user.
    AskUser,
    /// Free-form progress message.
    Message,
}

impl StreamEventKind {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::AskUser => "ask_user",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for StreamEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event on a run's stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event type.
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
    /// Position in the run's stream, assigned by the publisher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Typed view of an event's `data`.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    /// Execute `call`.
    Action(ToolCall),
    /// Run finished.
    Complete {
        /// Completion summary.
        summary: String,
    },
    /// Run or transport failed.
    Error {
        /// Failure description.
        message: String,
        /// Set on the synthetic event emitted when reconnects are exhausted.
        fatal: bool,
    },
    /// Question for the user.
    AskUser {
        /// The question.
        question: String,
        /// Suggested answers.
        options: Vec<String>,
    },
    /// Progress text.
    Message {
        /// The text.
        message: String,
    },
}

impl StreamEvent {
    /// Event with an explicit payload object and no index.
    pub fn new(kind: StreamEventKind, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind,
            index: None,
            data,
        }
    }

    /// `action` event for a tool call.
    pub fn action(call: &ToolCall) -> Self {
        Self::new(
            StreamEventKind::Action,
            json!({"tool": call.tool, "params": call.params}),
        )
    }

    /// `complete` event.
    pub fn complete(summary: impl Into<String>) -> Self {
        Self::new(
            StreamEventKind::Complete,
            json!({"summary": summary.into()}),
        )
    }

    /// Non-fatal `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StreamEventKind::Error, json!({"message": message.into()}))
    }

    /// Terminal `error` event raised when the transport gives up.
    pub fn fatal_error(message: impl Into<String>) -> Self {
        Self::new(
            StreamEventKind::Error,
            json!({"message": message.into(), "fatal": true}),
        )
    }

    /// `ask_user` event.
    pub fn ask_user(question: impl Into<String>, options: &[String]) -> Self {
        Self::new(
            StreamEventKind::AskUser,
            json!({"question": question.into(), "options": options}),
        )
    }

    /// `message` event.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(StreamEventKind::Message, json!({"message": message.into()}))
    }

    /// Same event stamped with `index`.
    #[must_use]
    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    /// Decode `data` according to `kind`.
    ///
    /// Missing text fields decode as empty strings; fields of the wrong type
    /// are an error.
    pub fn payload(&self) -> Result<EventPayload, serde_json::Error> {
        let data = Value::Object(self.data.clone());
        Ok(match self.kind {
            StreamEventKind::Action => EventPayload::Action(serde_json::from_value(data)?),
            StreamEventKind::Complete => {
                let p: TextFields = serde_json::from_value(data)?;
                EventPayload::Complete {
                    summary: p.summary.unwrap_or_default(),
                }
            }
            StreamEventKind::Error => {
                let p: TextFields = serde_json::from_value(data)?;
                EventPayload::Error {
                    message: p.message.unwrap_or_default(),
                    fatal: p.fatal.unwrap_or(false),
                }
            }
            StreamEventKind::AskUser => {
                let p: TextFields = serde_json::from_value(data)?;
                EventPayload::AskUser {
                    question: p.question.unwrap_or_default(),
                    options: p.options.unwrap_or_default(),
                }
            }
            StreamEventKind::Message => {
                let p: TextFields = serde_json::from_value(data)?;
                EventPayload::Message {
                    message: p.message.unwrap_or_default(),
                }
            }
        })
    }

    /// Whether this is the synthetic terminal transport error.
    pub fn is_fatal(&self) -> bool {
        self.kind == StreamEventKind::Error
            && self.data.get("fatal").and_then(Value::as_bool) == Some(true)
    }
}

#[derive(Deserialize)]
struct TextFields {
    summary: Option<String>,
    message: Option<String>,
    fatal: Option<bool>,
    question: Option<String>,
    options: Option<Vec<String>>,
}
