use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{NexoError, Result};
use crate::types::Period;

/// Top-level configuration for the Nexo assistant.
///
/// Loaded from `~/.nexo/config.toml` by default. Each section corresponds
/// to one collaborator of the conversational core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NexoConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl NexoConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NexoConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NexoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the core cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chat.max_input_chars == 0 {
            return Err(NexoError::Config(
                "chat.max_input_chars must be greater than zero".to_string(),
            ));
        }
        if self.chat.history_limit == 0 {
            return Err(NexoError::Config(
                "chat.history_limit must be greater than zero".to_string(),
            ));
        }
        if self.chat.default_list_limit == 0 {
            return Err(NexoError::Config(
                "chat.default_list_limit must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.classifier.temperature) {
            return Err(NexoError::Config(format!(
                "classifier.temperature must be within 0.0..=2.0, got {}",
                self.classifier.temperature
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Conversational core limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Inputs longer than this (in characters) are rejected before classification.
    pub max_input_chars: usize,
    /// Interactions kept per session.
    pub history_limit: usize,
    /// Interactions replayed to the classifier as context.
    pub prompt_history_turns: usize,
    /// Items shown by list operations when the user gives no limit.
    pub default_list_limit: usize,
    /// Analytics window when the user names none.
    pub default_period: Period,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 1000,
            history_limit: 10,
            prompt_history_turns: 3,
            default_list_limit: 10,
            default_period: Period::Week,
        }
    }
}

/// Which language-understanding backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierProvider {
    /// Offline regex rules, no network.
    #[default]
    Pattern,
    /// Any OpenAI-compatible chat completions endpoint.
    #[serde(rename = "openai")]
    OpenAi,
}

/// Language-understanding collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    /// Base URL of the chat completions API.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::Pattern,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            timeout_secs: 30,
        }
    }
}

/// Which knowledge-base backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreProvider {
    /// Process-local store, lost on exit.
    #[default]
    Memory,
    /// Remote REST knowledge-base service.
    Http,
}

/// Knowledge-base collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub provider: StoreProvider,
    pub base_url: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::Memory,
            base_url: "http://localhost:8080/api".to_string(),
            token_env: "NEXO_STORE_TOKEN".to_string(),
            timeout_secs: 15,
        }
    }
}
