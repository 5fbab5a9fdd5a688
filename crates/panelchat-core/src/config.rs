//! Configuration management for panelchat
//!
//! Handles loading, saving, and resolving application configuration
//! including the API key and model settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default environment variable consulted for the API key
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Chat session behaviour
    #[serde(default)]
    pub session: SessionSettings,
    /// Terminal tool settings
    #[serde(default)]
    pub terminal: TerminalConfig,
    /// General application settings
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key stored in the config file (environment wins when both are set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name for the API key
    pub api_key_env: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Base URL for the messages API
    pub base_url: String,
    /// Token limit for each model turn
    pub max_tokens: u32,
    /// Value of the API version header
    pub api_version: String,
    /// Overall request timeout in seconds
    pub request_timeout_secs: u64,
    /// Optional system prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            model: "claude-3-opus-20240229".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            api_version: "2023-06-01".to_string(),
            request_timeout_secs: 300,
            system_prompt: None,
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key.
    ///
    /// The environment variable takes precedence over the configured value.
    /// Blank values are treated as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(&self.api_key_env)
            && !key.trim().is_empty()
        {
            return Some(key);
        }

        self.api_key
            .as_ref()
            .filter(|key| !key.trim().is_empty())
            .cloned()
    }

    /// Resolve the API key or fail with `MissingCredential`
    pub fn require_api_key(&self) -> Result<String> {
        self.resolve_api_key()
            .ok_or_else(|| Error::MissingCredential(self.api_key_env.clone()))
    }
}

/// Chat session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound on model passes per user request
    pub max_iterations: usize,
    /// Persist conversation history after every mutation
    pub persist_history: bool,
    /// Storage key for the persisted history blob
    pub history_key: String,
    /// Phrases in a user request that make read_file contents visible
    pub reveal_phrases: Vec<String>,
    /// Register the run_command tool
    pub enable_terminal: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            persist_history: false,
            history_key: "panelChatHistory".to_string(),
            reveal_phrases: vec!["show me the contents".to_string()],
            enable_terminal: false,
        }
    }
}

impl SessionSettings {
    /// Whether `request` asks for file contents to be shown to the user
    pub fn wants_contents_shown(&self, request: &str) -> bool {
        let lowered = request.to_lowercase();
        self.reveal_phrases
            .iter()
            .any(|phrase| !phrase.is_empty() && lowered.contains(&phrase.to_lowercase()))
    }
}

/// Terminal tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell program used for the reusable terminal session
    pub shell: String,
    /// Substrings that cause a command to be refused
    pub blocked_commands: Vec<String>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        let shell = if cfg!(windows) { "cmd" } else { "sh" };
        Self {
            shell: shell.to_string(),
            blocked_commands: [
                "rm -rf /",
                "sudo ",
                "mkfs",
                "dd if=/dev",
                ":(){:|:&};:",
                "format c:",
                "del /f /s /q c:\\",
                "rd /s /q c:\\",
                "reg delete",
                "bcdedit",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Workspace directory used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,
    /// Log level
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            workspace_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with the default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("panelchat").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Path this manager reads from and saves to
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the manager, returning the configuration
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Store an API key in the config file
    pub fn set_api_key(&mut self, key: String) {
        self.config.provider.api_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.provider.max_tokens, 4096);
        assert_eq!(config.session.max_iterations, 10);
        assert!(!config.session.enable_terminal);
        assert!(!config.session.persist_history);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [provider]
            model = "claude-3-haiku-20240307"

            [session]
            enable_terminal = true
            "#,
        )
        .unwrap();

        assert_eq!(parsed.provider.model, "claude-3-haiku-20240307");
        assert_eq!(parsed.provider.max_tokens, 4096);
        assert!(parsed.session.enable_terminal);
        assert_eq!(parsed.session.max_iterations, 10);
    }

    #[test]
    fn test_reveal_phrase_is_case_insensitive() {
        let settings = SessionSettings::default();
        assert!(settings.wants_contents_shown("Please SHOW ME THE CONTENTS of main.rs"));
        assert!(!settings.wants_contents_shown("summarize main.rs"));
    }
}
