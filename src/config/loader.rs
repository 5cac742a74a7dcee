use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::types::CliConfig;
use crate::output::OutputFormat;
use crate::poll::{MAX_POLL_INTERVAL, MIN_POLL_INTERVAL};

pub const ENV_BASE_URL: &str = "HYPEMAN_BASE_URL";
pub const ENV_API_KEY: &str = "HYPEMAN_API_KEY";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl CliConfig {
    /// `~/.config/hypeman/cli.toml` on Linux, the platform equivalent
    /// elsewhere; the current directory if there is no config dir.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("hypeman").join("cli.toml")
    }

    /// Load the default config file and overlay the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(CliConfig::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: CliConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay `HYPEMAN_BASE_URL` and `HYPEMAN_API_KEY`. Empty values are
    /// ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.base_url = Some(url);
        }
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.idle_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "stream.idle_timeout_seconds must be greater than 0".to_string(),
            });
        }

        let interval = self.poll_interval();
        if interval < MIN_POLL_INTERVAL || interval > MAX_POLL_INTERVAL {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "poll.interval_ms must be between {} and {}",
                    MIN_POLL_INTERVAL.as_millis(),
                    MAX_POLL_INTERVAL.as_millis()
                ),
            });
        }

        if let Err(e) = OutputFormat::from_str(&self.output.format) {
            return Err(ConfigError::ValidationError {
                message: format!("output.format: {e}"),
            });
        }

        Ok(())
    }
}
