//! Model and Prompt Catalog
//!
//! Listings served next to the completion endpoint.

use serde::{Deserialize, Serialize};

/// A chat model the server can complete with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Identifier to put in `CompletionRequest::model`
    pub id: String,

    /// Human readable name
    #[serde(default)]
    pub name: String,

    /// Context window in tokens
    #[serde(default)]
    pub context_length: u32,

    /// Whether the model supports streamed responses
    #[serde(default)]
    pub can_stream: bool,
}

/// `{ "object": "list", "data": [...] }` envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub object: Option<String>,

    #[serde(default)]
    pub data: Vec<ModelDescriptor>,
}

/// A stored prompt template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub name: String,

    /// System prompt
    #[serde(default)]
    pub prompt: Option<String>,

    /// Text prefilled into the user turn
    #[serde(default)]
    pub user_prompt: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default)]
    pub is_default: Option<bool>,

    /// Suggested sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,

    /// Page the prompt is stored on
    #[serde(default, rename = "xwikiPageName")]
    pub page_name: Option<String>,
}

impl PromptTemplate {
    /// Inactive prompts are hidden from pickers
    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }
}
