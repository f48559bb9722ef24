//! CLI argument definitions for the Nexo assistant.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, ValueEnum};
use nexo_core::config::{ClassifierProvider, NexoConfig, StoreProvider};
use std::path::PathBuf;

/// Nexo: manage tasks, notes and projects by chatting in natural language.
#[derive(Parser, Debug)]
#[command(name = "nexo", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Send a single message, print the reply and exit.
    #[arg(short = 'm', long = "message")]
    pub message: Option<String>,

    /// Session id to continue. A new one is minted when omitted.
    #[arg(short = 's', long = "session")]
    pub session: Option<String>,

    /// Language-understanding backend.
    #[arg(long = "classifier", value_enum)]
    pub classifier: Option<ClassifierChoice>,

    /// Knowledge-base backend.
    #[arg(long = "store", value_enum)]
    pub store: Option<StoreChoice>,

    /// Base URL of the knowledge-base REST service.
    #[arg(long = "store-url")]
    pub store_url: Option<String>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long = "init-config")]
    pub init_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClassifierChoice {
    Pattern,
    #[value(name = "openai")]
    OpenAi,
}

impl From<ClassifierChoice> for ClassifierProvider {
    fn from(choice: ClassifierChoice) -> Self {
        match choice {
            ClassifierChoice::Pattern => ClassifierProvider::Pattern,
            ClassifierChoice::OpenAi => ClassifierProvider::OpenAi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreChoice {
    Memory,
    Http,
}

impl From<StoreChoice> for StoreProvider {
    fn from(choice: StoreChoice) -> Self {
        match choice {
            StoreChoice::Memory => StoreProvider::Memory,
            StoreChoice::Http => StoreProvider::Http,
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > NEXO_CONFIG env var > platform default (~/.nexo/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("NEXO_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > NEXO_LOG_LEVEL env var > config file value.
    pub fn resolve_log_level(&self, config: &NexoConfig) -> String {
        self.log_level
            .clone()
            .or_else(|| std::env::var("NEXO_LOG_LEVEL").ok())
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    /// Apply flag and environment overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut NexoConfig) {
        self.apply_overrides_with(config, |key| std::env::var(key).ok());
    }

    /// As [`apply_overrides`](Self::apply_overrides), reading the environment through `env`.
    pub fn apply_overrides_with(
        &self,
        config: &mut NexoConfig,
        env: impl Fn(&str) -> Option<String>,
    ) {
        let classifier =
            env("NEXO_CLASSIFIER").and_then(|v| ClassifierChoice::from_str(&v, true).ok());
        if let Some(choice) = self.classifier.or(classifier) {
            config.classifier.provider = choice.into();
        }
        let store = env("NEXO_STORE").and_then(|v| StoreChoice::from_str(&v, true).ok());
        if let Some(choice) = self.store.or(store) {
            config.store.provider = choice.into();
        }
        if let Some(url) = self.store_url.clone().or_else(|| env("NEXO_STORE_URL")) {
            config.store.base_url = url;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".nexo").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".nexo").join("config.toml");
    }
    PathBuf::from("config.toml")
}
