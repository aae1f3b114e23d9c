//! Wikichat Error Types
//!
//! Error handling for request validation, transport, stream parsing and
//! cancellation.

use reqwest::StatusCode;

/// A completion request field failed validation.
///
/// Always raised before anything is sent to the network.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Model identifier is empty or whitespace
    #[error("model must be a non-empty string")]
    EmptyModel,

    /// Temperature is NaN or infinite
    #[error("temperature must be a number between 0 and 2, got {0}")]
    TemperatureNotFinite(f64),

    /// Temperature outside of `[0, 2]`
    #[error("temperature must be between 0 and 2, got {0}")]
    TemperatureOutOfRange(f64),

    /// Role is not one of system, user or assistant
    #[error("role must be either \"system\", \"user\" or \"assistant\", got {0:?}")]
    InvalidRole(String),

    /// Message content is empty or whitespace
    #[error("content of message {index} must be a non-empty string")]
    EmptyContent { index: usize },
}

/// Main error type for wikichat operations
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The request was rejected before transmission
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The server answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Network failure (connect, timeout, broken body stream)
    #[error("Request failed: {0}")]
    Transport(String),

    /// A response body or stream frame was not valid JSON of the expected shape
    #[error("Failed to parse response: {message}. Data: {data}")]
    Parse { message: String, data: String },

    /// The call was cancelled by the caller
    #[error("Request aborted")]
    Aborted,

    /// Configuration errors (unreadable file, invalid JSON, bad URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Build a parse error, keeping a bounded excerpt of the offending data
    pub fn parse(err: impl std::fmt::Display, data: &str) -> Self {
        ChatError::Parse {
            message: err.to_string(),
            data: excerpt(data),
        }
    }

    /// True for user-initiated cancellation.
    ///
    /// Callers use this to suppress error display for a stop they asked for.
    pub fn is_abort(&self) -> bool {
        matches!(self, ChatError::Aborted)
    }

    /// True for non-success statuses and network failures
    pub fn is_transport(&self) -> bool {
        matches!(self, ChatError::Status { .. } | ChatError::Transport(_))
    }

    /// True for malformed response data
    pub fn is_parse(&self) -> bool {
        matches!(self, ChatError::Parse { .. })
    }
}

/// Truncate `data` to at most 500 bytes on a char boundary
pub(crate) fn excerpt(data: &str) -> String {
    const MAX: usize = 500;
    if data.len() <= MAX {
        return data.to_string();
    }
    let mut end = MAX;
    while !data.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &data[..end])
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Transport(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ChatError::Transport(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ChatError::Parse {
                message: format!("Failed to decode response: {}", err),
                data: String::new(),
            }
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Parse {
            message: format!("JSON parsing error: {}", err),
            data: String::new(),
        }
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Config(format!("IO error: {}", err))
    }
}

/// Result type alias for wikichat operations
pub type Result<T> = std::result::Result<T, ChatError>;
