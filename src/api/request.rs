//! Completion Request
//!
//! A validated chat completion request. Every constructor and mutator checks
//! its input, and the whole request is checked again before it is serialized
//! for transport, so an invalid request never reaches the network.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest accepted sampling temperature
pub const MIN_TEMPERATURE: f64 = 0.0;

/// Highest accepted sampling temperature
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Plain wire record produced by [`CompletionRequest::serialize`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub model: String,
    pub temperature: f64,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// Chat completion request
///
/// Fields are private: the only ways to obtain or change a request go
/// through validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RequestPayload")]
pub struct CompletionRequest {
    model: String,
    temperature: f64,
    messages: Vec<ChatMessage>,
    stream: bool,
}

impl CompletionRequest {
    /// Create a request, validating every field
    pub fn create(
        model: impl Into<String>,
        temperature: f64,
        messages: Vec<ChatMessage>,
        stream: bool,
    ) -> Result<Self, ValidationError> {
        let request = Self {
            model: model.into(),
            temperature,
            messages,
            stream,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn stream(&self) -> bool {
        self.stream
    }

    /// Replace the model; the previous value is kept on error
    pub fn set_model(&mut self, model: impl Into<String>) -> Result<(), ValidationError> {
        let model = model.into();
        check_model(&model)?;
        self.model = model;
        Ok(())
    }

    /// Replace the temperature; the previous value is kept on error
    pub fn set_temperature(&mut self, temperature: f64) -> Result<(), ValidationError> {
        check_temperature(temperature)?;
        self.temperature = temperature;
        Ok(())
    }

    /// Replace the whole history; the previous history is kept on error
    pub fn set_messages(&mut self, messages: Vec<ChatMessage>) -> Result<(), ValidationError> {
        check_messages(&messages)?;
        self.messages = messages;
        Ok(())
    }

    pub fn set_stream(&mut self, stream: bool) {
        self.stream = stream;
    }

    /// Append one message, parsing the role from its wire name
    pub fn append_message(
        &mut self,
        role: &str,
        content: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let role = role.parse::<Role>()?;
        let message = ChatMessage::new(role, content);
        check_message(self.messages.len(), &message)?;
        self.messages.push(message);
        Ok(())
    }

    /// Check every field of the request
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_model(&self.model)?;
        check_temperature(self.temperature)?;
        check_messages(&self.messages)
    }

    /// Re-validate and produce the wire record
    pub fn serialize(&self) -> Result<RequestPayload, ValidationError> {
        self.validate()?;
        Ok(RequestPayload {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: self.messages.clone(),
            stream: self.stream,
        })
    }
}

impl TryFrom<RequestPayload> for CompletionRequest {
    type Error = ValidationError;

    fn try_from(payload: RequestPayload) -> Result<Self, Self::Error> {
        Self::create(
            payload.model,
            payload.temperature,
            payload.messages,
            payload.stream,
        )
    }
}

fn check_model(model: &str) -> Result<(), ValidationError> {
    if model.trim().is_empty() {
        return Err(ValidationError::EmptyModel);
    }
    Ok(())
}

fn check_temperature(temperature: f64) -> Result<(), ValidationError> {
    if !temperature.is_finite() {
        return Err(ValidationError::TemperatureNotFinite(temperature));
    }
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(ValidationError::TemperatureOutOfRange(temperature));
    }
    Ok(())
}

fn check_messages(messages: &[ChatMessage]) -> Result<(), ValidationError> {
    messages
        .iter()
        .enumerate()
        .try_for_each(|(index, message)| check_message(index, message))
}

fn check_message(index: usize, message: &ChatMessage) -> Result<(), ValidationError> {
    if message.content.trim().is_empty() {
        return Err(ValidationError::EmptyContent { index });
    }
    Ok(())
}
