//! Configuration module for panelbridge.
//!
//! Loads typed configuration from `~/.panelbridge/config.json`.
//! Every field is defaulted, so a missing or partial file still yields a
//! usable config; credentials and selectors simply stay unset until the
//! user fills them in.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::provider::local;
use crate::provider::multimodal;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub defaults: DefaultsConfig,
}

impl Config {
    /// Load configuration from the default path (`~/.panelbridge/config.json`).
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".panelbridge")
            .join("config.json")
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "providers": {
                "ollama": { "baseUrl": local::DEFAULT_BASE_URL },
                "gemini": { "apiKey": "YOUR_KEY_HERE" },
                "host": { "selector": "gpt-4o" }
            },
            "defaults": {
                "provider": "local"
            }
        });

        std::fs::write(&path, serde_json::to_string_pretty(&template)?)?;
        Ok(path)
    }
}

// ── Provider Configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ollama: OllamaConfig,
    pub gemini: GeminiConfig,
    pub host: HostConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OllamaConfig {
    pub base_url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: local::DEFAULT_BASE_URL.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeminiConfig {
    /// Empty means "read the environment at call time".
    pub api_key: String,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: multimodal::DEFAULT_BASE_URL.into(),
        }
    }
}

impl GeminiConfig {
    /// Key as an option, `None` when left unset.
    pub fn api_key(&self) -> Option<String> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(self.api_key.clone())
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostConfig {
    /// Selector handed to the editor host's model query.
    pub selector: Option<String>,
}

// ── Defaults Configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefaultsConfig {
    /// Provider tag used when the panel omits one.
    pub provider: String,
    /// Model key used when the panel omits one.
    pub model_key: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: "local".into(),
            model_key: None,
        }
    }
}
