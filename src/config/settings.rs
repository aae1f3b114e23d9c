//! Client Configuration
//!
//! Connection settings, request defaults and endpoint construction.

use crate::client::decoder::DEFAULT_MAX_FRAME_BYTES;
use crate::client::Framing;
use crate::error::{ChatError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Server root used when nothing is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/xwiki";

/// Wiki used when nothing is configured
pub const DEFAULT_WIKI_NAME: &str = "xwiki";

/// Settings a front-end may expose to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiSetting {
    ServerAddress,
    Temperature,
    Model,
    Stream,
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server root, e.g. `https://wiki.example.com/xwiki`
    pub base_url: String,

    /// Wiki whose REST API serves completions
    pub wiki_name: String,

    /// Bearer credential
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable read when `api_key` is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Environment variable overriding `base_url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_env: Option<String>,

    /// Default model for new requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Default sampling temperature
    pub temperature: f64,

    /// Default streaming flag
    pub stream: bool,

    /// How streamed responses are split into frames
    pub framing: Framing,

    /// Additional headers to send with requests
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Largest partial frame held while streaming
    pub max_frame_bytes: usize,

    /// Settings a front-end should let the user change; empty allows all
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chat_ui_settings: Vec<UiSetting>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            wiki_name: DEFAULT_WIKI_NAME.to_string(),
            api_key: None,
            api_key_env: Some("WIKICHAT_API_KEY".to_string()),
            api_base_env: Some("WIKICHAT_BASE_URL".to_string()),
            model: None,
            temperature: 1.0,
            stream: false,
            framing: Framing::default(),
            headers: HashMap::new(),
            connect_timeout_secs: 10,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            chat_ui_settings: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Get the effective base URL (from env var if configured, otherwise default)
    pub fn effective_base_url(&self) -> String {
        if let Some(env_var) = &self.api_base_env {
            if let Ok(url) = std::env::var(env_var) {
                if !url.trim().is_empty() {
                    return url;
                }
            }
        }
        self.base_url.clone()
    }

    /// Get the API key, falling back to the configured environment variable
    pub fn effective_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var).ok())
            .filter(|k| !k.is_empty())
    }

    /// Whether a front-end may let the user change `setting`
    pub fn allows(&self, setting: UiSetting) -> bool {
        self.chat_ui_settings.is_empty() || self.chat_ui_settings.contains(&setting)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `POST` target for chat completions
    pub fn completions_url(&self) -> Result<Url> {
        self.endpoint(&["chat", "completions"])
    }

    /// `GET` target listing chat models
    pub fn models_url(&self) -> Result<Url> {
        self.endpoint(&["models"])
    }

    /// `GET` target listing stored prompts
    pub fn prompts_url(&self) -> Result<Url> {
        self.endpoint(&["prompts"])
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url> {
        let base = self.effective_base_url();
        let mut url = Url::parse(&base)
            .map_err(|e| ChatError::Config(format!("Invalid base URL '{}': {}", base, e)))?;

        url.path_segments_mut()
            .map_err(|_| ChatError::Config(format!("Base URL '{}' cannot have a path", base)))?
            .pop_if_empty()
            .extend(["rest", "wikis"])
            .push(&self.wiki_name)
            .extend(["aiLLM", "v1"])
            .extend(tail);

        url.set_query(Some("media=json"));
        Ok(url)
    }
}
