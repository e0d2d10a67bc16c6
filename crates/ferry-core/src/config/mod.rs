//! Configuration management for Ferry.
//!
//! This module handles loading, saving, and validating Ferry configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/ferry/config.toml` |
//! | macOS | `~/Library/Application Support/Ferry/config.toml` |
//! | Windows | `%APPDATA%\Ferry\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [stream]
//! endpoint = "https://chat.example.com/api/uploads/progress"
//! connect_timeout = "10s"
//! idle_timeout = "1m"
//!
//! [display]
//! refresh_interval = "250ms"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration struct for Ferry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Progress stream settings
    pub stream: StreamConfig,
    /// Terminal display settings
    pub display: DisplayConfig,
}

/// Progress stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Base URL of the progress endpoint; the file name is appended as a path segment
    pub endpoint: String,
    /// Time allowed to establish the connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Longest silence (including keep-alives) before the stream is considered dead
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// User agent sent with stream requests
    pub user_agent: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(crate::DEFAULT_IDLE_TIMEOUT_SECS),
            user_agent: format!("ferry/{}", crate::VERSION),
        }
    }
}

/// Terminal display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Minimum time between redraws
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Emit JSON lines instead of a progress table
    pub json: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(250),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Check values that parse but can't work.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.stream.endpoint).map_err(|e| Error::InvalidConfig {
            key: "stream.endpoint".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig {
                key: "stream.endpoint".to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.stream.connect_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                key: "stream.connect_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.stream.idle_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                key: "stream.idle_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "ferry", "Ferry")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();

        let (digits, unit_secs, unit_millis) = if let Some(ms) = s.strip_suffix("ms") {
            (ms, 0, 1)
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, 1, 0)
        } else if let Some(mins) = s.strip_suffix('m') {
            (mins, 60, 0)
        } else if let Some(hours) = s.strip_suffix('h') {
            (hours, 3600, 0)
        } else {
            return Err(serde::de::Error::custom("invalid duration format"));
        };

        let n: u64 = digits.trim().parse().map_err(serde::de::Error::custom)?;
        let secs = n
            .checked_mul(unit_secs)
            .ok_or_else(|| serde::de::Error::custom("duration out of range"))?;
        Ok(Duration::from_secs(secs) + Duration::from_millis(n * unit_millis))
    }
}
