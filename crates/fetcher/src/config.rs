//! Configuration management for safe-fetch.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/safe-fetch/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use download::{Policy, DEFAULT_MAX_BYTES, MIN_MAX_BYTES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("downloads.root is not set")]
    MissingRoot,

    #[error("downloads.root must be an absolute path to an existing directory, got {0}")]
    InvalidRoot(PathBuf),

    #[error("downloads.allowed_extensions must not be empty")]
    NoExtensions,

    #[error("downloads.allowed_extensions must not contain blank entries")]
    BlankExtension,

    #[error("max_bytes must be at least {min}, got {0}", min = MIN_MAX_BYTES)]
    InvalidMaxBytes(u64),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for safe-fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Storage root and download policy.
    pub downloads: DownloadsConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Download policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Directory files are served from. Must be set before serving.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Extensions that may be served, with or without a leading dot.
    pub allowed_extensions: Vec<String>,

    /// Maximum size of a served file in bytes (default: 50MB).
    pub max_bytes: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,

    /// Append logs to this file instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            root: None,
            allowed_extensions: vec![
                ".txt".to_string(),
                ".pdf".to_string(),
                ".png".to_string(),
                ".jpg".to_string(),
                ".jpeg".to_string(),
            ],
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("safe-fetch")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - SAFE_FETCH_ROOT: Override the storage root
    /// - SAFE_FETCH_MAX_BYTES: Override the size limit
    /// - SAFE_FETCH_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("SAFE_FETCH_ROOT") {
            if !root.is_empty() {
                tracing::info!(root = %root, "Overriding downloads.root from environment");
                self.downloads.root = Some(PathBuf::from(root));
            }
        }

        if let Ok(max_bytes) = std::env::var("SAFE_FETCH_MAX_BYTES") {
            if !max_bytes.is_empty() {
                match max_bytes.trim().parse::<u64>() {
                    Ok(value) => {
                        tracing::info!(max_bytes = value, "Overriding max_bytes from environment");
                        self.downloads.max_bytes = value;
                    }
                    Err(e) => {
                        tracing::warn!(
                            value = %max_bytes,
                            error = %e,
                            "Ignoring unparsable SAFE_FETCH_MAX_BYTES"
                        );
                    }
                }
            }
        }

        if let Ok(level) = std::env::var("SAFE_FETCH_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!(level = %level, "Overriding log level from environment");
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Mirrors the checks [`Policy::new`] performs so that problems are
    /// reported against config keys before any policy is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let root = self.downloads.root.as_ref().ok_or(ConfigError::MissingRoot)?;
        if root.as_os_str().is_empty() {
            return Err(ConfigError::MissingRoot);
        }
        if !root.is_absolute() || !root.is_dir() {
            return Err(ConfigError::InvalidRoot(root.clone()));
        }

        if self.downloads.allowed_extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        if self
            .downloads
            .allowed_extensions
            .iter()
            .any(|ext| download::policy::normalize_extension(ext).is_none())
        {
            return Err(ConfigError::BlankExtension);
        }

        if self.downloads.max_bytes < MIN_MAX_BYTES {
            return Err(ConfigError::InvalidMaxBytes(self.downloads.max_bytes));
        }

        let level = self.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        Ok(())
    }

    /// Validate the configuration and build the immutable download policy.
    pub fn policy(&self) -> Result<Policy> {
        self.validate()?;

        let root = self
            .downloads
            .root
            .as_deref()
            .ok_or(ConfigError::MissingRoot)?;

        Policy::new(
            root,
            &self.downloads.allowed_extensions,
            self.downloads.max_bytes,
        )
        .with_context(|| format!("Failed to build download policy for {}", root.display()))
    }

    /// The configuration as the policy actually enforces it.
    ///
    /// The root is replaced by its canonical form and the extension list by
    /// its normalized, de-duplicated form.
    pub fn effective(&self, policy: &Policy) -> Config {
        let mut config = self.clone();
        config.downloads.root = Some(policy.root().to_path_buf());
        config.downloads.allowed_extensions =
            policy.allowed_extensions().map(str::to_string).collect();
        config.downloads.max_bytes = policy.max_bytes();
        config
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
