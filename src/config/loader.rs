//! Configuration Loader
//!
//! Handles loading and merging client configuration from multiple sources.

use crate::config::settings::ClientConfig;
use crate::error::{ChatError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    /// Merged configuration as JSON, deserialized on demand
    merged: Map<String, Value>,
}

impl ConfigLoader {
    /// Create a new config loader and load from default locations
    pub fn new() -> Result<Self> {
        let mut loader = Self::with_defaults()?;
        loader.load_from_default_paths()?;
        Ok(loader)
    }

    /// Create a loader with a specific config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self::with_defaults()?;
        loader.load_from_file(path)?;
        Ok(loader)
    }

    /// Loader holding only the built-in defaults
    fn with_defaults() -> Result<Self> {
        match serde_json::to_value(ClientConfig::default())? {
            Value::Object(merged) => Ok(Self { merged }),
            _ => Err(ChatError::Internal(
                "Default configuration is not a JSON object".to_string(),
            )),
        }
    }

    /// Load configuration from default paths
    fn load_from_default_paths(&mut self) -> Result<()> {
        for path in Self::get_config_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                self.load_from_file(&path)?;
            }
        }
        Ok(())
    }

    /// Get list of config paths to check, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".wikichat").join("config.json"));
        }

        // 2. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("wikichat").join("config.json"));
        }

        // 3. Current directory
        paths.push(PathBuf::from("wikichat.json"));

        // 4. Environment variable
        if let Ok(custom_path) = std::env::var("WIKICHAT_CONFIG_PATH") {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            ChatError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        match value {
            Value::Object(other) => {
                self.merge_config(other);
                Ok(())
            }
            _ => Err(ChatError::Config(format!(
                "{} must contain a JSON object",
                path.display()
            ))),
        }
    }

    /// Merge another config into this one (later configs override earlier).
    ///
    /// Top-level fields are replaced; `headers` entries are merged by key.
    fn merge_config(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            if let Value::Object(incoming) = &value {
                if let Some(Value::Object(existing)) = self.merged.get_mut(&key) {
                    existing.extend(incoming.clone());
                    continue;
                }
            }
            self.merged.insert(key, value);
        }
    }

    /// Build the merged configuration
    pub fn config(&self) -> Result<ClientConfig> {
        serde_json::from_value(Value::Object(self.merged.clone()))
            .map_err(|e| ChatError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> Result<ClientConfig> {
        serde_json::from_value(Value::Object(self.merged))
            .map_err(|e| ChatError::Config(format!("Invalid configuration: {}", e)))
    }
}
