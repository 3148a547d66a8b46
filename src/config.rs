use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ChatError;
use crate::events::ConversationMode;

/// Environment variable holding the Gemini API credential
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable overriding the gemchat home directory
pub const HOME_ENV: &str = "GEMCHAT_HOME";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model used for every generation call
    pub model: String,

    /// Root of the Gemini REST API
    pub base_url: String,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// Multi-turn chat or stateless one-shot generation
    pub mode: ConversationMode,

    /// HTTP listener settings
    pub server: ServerConfig,

    /// Attachment upload and readiness polling
    pub upload: UploadConfig,

    /// gemchat home directory (not persisted)
    #[serde(skip)]
    pub home: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Drop conversations untouched for this long; 0 keeps them until deleted
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Fixed delay between two status checks
    pub poll_interval_secs: u64,
    /// Total status checks before giving up, counting the upload response itself
    pub max_poll_attempts: u32,
    /// Keep the pending attachment after an upload or processing failure
    pub retain_attachment_on_error: bool,
    /// Largest file accepted by the HTTP upload endpoint
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            request_timeout_secs: 120,
            mode: ConversationMode::MultiTurn,
            server: ServerConfig::default(),
            upload: UploadConfig::default(),
            home: default_home(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            idle_timeout_secs: 3600,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            max_poll_attempts: 60,
            retain_attachment_on_error: false,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl UploadConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_home() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gemchat")
}

impl Config {
    /// Load configuration from `config.toml` in the gemchat home, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&default_home())
    }

    pub fn load_from(home: &Path) -> Result<Self> {
        fs::create_dir_all(home).context("Failed to create gemchat home directory")?;

        let config_path = home.join("config.toml");
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            Self::from_toml_str(&content)?
        } else {
            Config::default()
        };

        config.home = home.to_path_buf();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        if config.upload.max_poll_attempts == 0 {
            anyhow::bail!("upload.max_poll_attempts must be at least 1");
        }
        Ok(config)
    }

    /// Directory where files received over HTTP wait before upload
    pub fn staging_dir(&self) -> PathBuf {
        self.home.join("uploads")
    }

    /// Read the API credential from the environment; startup cannot proceed without it
    pub fn api_key() -> Result<String, ChatError> {
        Self::resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    pub fn resolve_api_key(value: Option<String>) -> Result<String, ChatError> {
        value
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ChatError::MissingApiKey(API_KEY_ENV))
    }
}
