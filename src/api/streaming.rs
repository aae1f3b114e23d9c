//! Streaming Events
//!
//! Event records delivered by a streaming completion, and helpers for
//! folding them into a final message.

use crate::api::completion::Usage;
use crate::api::request::{ChatMessage, Role};
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};

/// One decoded streaming event.
///
/// Either an incremental content fragment (`choices[0].delta.content`), a
/// usage summary, or an error record emitted by the server mid-stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaEvent {
    /// Chunk ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Object type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,

    /// Model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Choices with deltas
    #[serde(default)]
    pub choices: Vec<StreamChoice>,

    /// Usage info (only in final chunk for some servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Error reported by the server in place of a chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

/// A choice in a streaming chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,

    /// The delta (partial message)
    #[serde(default)]
    pub delta: StreamDelta,

    /// Whole message, sent instead of a delta when the reply was not streamed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<StreamDelta>,

    /// Finish reason (set in final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta content in a streaming chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Role (usually only in first chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Content delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// OpenAI-style error object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<serde_json::Value>,
}

impl StreamChoice {
    /// Delta content, falling back to a whole message
    pub fn content(&self) -> Option<&str> {
        self.delta
            .content
            .as_deref()
            .or_else(|| self.message.as_ref()?.content.as_deref())
    }

    pub fn role(&self) -> Option<Role> {
        self.delta
            .role
            .or_else(|| self.message.as_ref()?.role)
    }
}

impl DeltaEvent {
    /// Content fragment of the first choice, if any
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(StreamChoice::content)
    }

    /// Finish reason of the first choice, if any
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }
}

/// Parse one frame payload into an event
pub fn parse_event(payload: &str) -> Result<DeltaEvent> {
    serde_json::from_str(payload).map_err(|e| ChatError::parse(e, payload))
}

/// Outcome of a streaming call.
///
/// Only bounded data is kept; the text itself flows through the callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    /// Number of events dispatched to the callback
    pub events: usize,

    /// Last usage totals reported by the server
    pub usage: Option<Usage>,

    /// Last finish reason reported by the server
    pub finish_reason: Option<String>,
}

impl StreamSummary {
    /// Record the bounded parts of an event about to be dispatched
    pub fn observe(&mut self, event: &DeltaEvent) {
        self.events += 1;
        if event.usage.is_some() {
            self.usage = event.usage;
        }
        if let Some(reason) = event.finish_reason() {
            self.finish_reason = Some(reason.to_string());
        }
    }
}

/// Caller-side accumulator folding events into the final message
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    /// Accumulated content
    pub content: String,

    /// Role from first chunk
    pub role: Option<Role>,

    /// Finish reason from last chunk
    pub finish_reason: Option<String>,

    /// Usage from final chunk
    pub usage: Option<Usage>,

    /// Error records seen in the stream
    pub errors: Vec<ApiErrorBody>,
}

impl StreamAccumulator {
    /// Create a new accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a streaming event
    pub fn process(&mut self, event: &DeltaEvent) {
        if event.usage.is_some() {
            self.usage = event.usage;
        }

        if let Some(error) = &event.error {
            self.errors.push(error.clone());
        }

        for choice in &event.choices {
            if choice.index != 0 {
                continue;
            }

            if let Some(role) = choice.role() {
                self.role.get_or_insert(role);
            }

            if let Some(content) = choice.content() {
                self.content.push_str(content);
            }

            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(reason.clone());
            }
        }
    }

    /// Convert to a final message, `None` when nothing was generated
    pub fn into_message(self) -> Option<ChatMessage> {
        if self.content.trim().is_empty() {
            return None;
        }
        Some(ChatMessage::new(
            self.role.unwrap_or(Role::Assistant),
            self.content,
        ))
    }
}
