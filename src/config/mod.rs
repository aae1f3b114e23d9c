//! Configuration Module
//!
//! Handles client configuration loading and endpoint construction.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{ClientConfig, UiSetting, DEFAULT_BASE_URL, DEFAULT_WIKI_NAME};
