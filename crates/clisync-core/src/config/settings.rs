use crate::error::ConfigError;
use crate::retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Config {
    /// Load config from file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        super::validation::warn_unknown_fields(&content, "config.json");
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Index update retries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between failed attempts; 0 retries immediately
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl SyncConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_delay(Duration::from_millis(self.retry_delay_ms))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: 0,
        }
    }
}

/// How to reach the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default = "default_max_attempts")]
    pub connect_attempts: u32,

    #[serde(default = "default_connect_retry_delay")]
    pub connect_retry_delay_ms: u64,

    /// Host joined with bare-port endpoints
    #[serde(default = "default_host")]
    pub default_host: String,
}

impl ConnectionConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.connect_attempts)
            .with_delay(Duration::from_millis(self.connect_retry_delay_ms))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_max_attempts(),
            connect_retry_delay_ms: default_connect_retry_delay(),
            default_host: default_host(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_connect_retry_delay() -> u64 {
    500
}
fn default_host() -> String {
    "localhost".to_string()
}
