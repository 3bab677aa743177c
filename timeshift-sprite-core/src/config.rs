use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::MAX_RESPONSE_SIZE;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub fetcher: FetcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Sprite fetcher tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// URL scheme used for both manifest and sprite sheet requests
    pub scheme: String,
    pub manifest_timeout_seconds: u64,
    /// Sprite sheets are larger than manifests, so they get more time
    pub sprite_timeout_seconds: u64,
    /// Decoded sprite sheets kept in memory
    pub big_cache_capacity: usize,
    /// Cropped thumbnails kept in memory
    pub small_cache_capacity: usize,
    pub max_response_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            manifest_timeout_seconds: 5,
            sprite_timeout_seconds: 10,
            big_cache_capacity: 30,
            small_cache_capacity: 10,
            max_response_bytes: MAX_RESPONSE_SIZE,
        }
    }
}

impl FetcherConfig {
    #[must_use]
    pub const fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_seconds)
    }

    #[must_use]
    pub const fn sprite_timeout(&self) -> Duration {
        Duration::from_secs(self.sprite_timeout_seconds)
    }
}

impl Config {
    /// Load configuration from file and environment variables
    ///
    /// Priority (highest first):
    /// 1. Environment variables (`TSPRITE_FETCHER__BIG_CACHE_CAPACITY`, ...)
    /// 2. Config file
    /// 3. Defaults
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Field names contain underscores, so nesting uses a double underscore
        builder = builder.add_source(
            Environment::with_prefix("TSPRITE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Collect every configuration problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.fetcher.scheme.as_str(), "http" | "https") {
            errors.push(format!(
                "fetcher.scheme must be http or https, got '{}'",
                self.fetcher.scheme
            ));
        }
        if self.fetcher.manifest_timeout_seconds == 0 {
            errors.push("fetcher.manifest_timeout_seconds must be greater than 0".to_string());
        }
        if self.fetcher.sprite_timeout_seconds == 0 {
            errors.push("fetcher.sprite_timeout_seconds must be greater than 0".to_string());
        }
        if self.fetcher.big_cache_capacity == 0 {
            errors.push("fetcher.big_cache_capacity must be greater than 0".to_string());
        }
        if self.fetcher.small_cache_capacity == 0 {
            errors.push("fetcher.small_cache_capacity must be greater than 0".to_string());
        }
        if self.fetcher.max_response_bytes == 0 {
            errors.push("fetcher.max_response_bytes must be greater than 0".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be json or pretty, got '{}'",
                self.logging.format
            ));
        }
        if crate::logging::parse_log_level(&self.logging.level).is_err() {
            errors.push(format!("logging.level '{}' is not a valid level", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
