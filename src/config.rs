//! Configuration loading from TOML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::component::Style;
use crate::error::{ConfigError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inactivity: InactivityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Watchdog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InactivityConfig {
    /// Silence before going inactive, in milliseconds.
    #[serde(default = "default_time_for_inactivity_ms")]
    pub time_for_inactivity_ms: u64,
    /// Force-active flag applied at mount.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Container style forwarded to the renderer.
    #[serde(default)]
    pub style: Option<Style>,
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            time_for_inactivity_ms: default_time_for_inactivity_ms(),
            is_active: None,
            style: None,
        }
    }
}

impl InactivityConfig {
    pub fn time_for_inactivity(&self) -> Duration {
        Duration::from_millis(self.time_for_inactivity_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub(crate) fn default_time_for_inactivity_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("user-inactivity/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.is_file() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("USER_INACTIVITY_TIME_MS") {
            if let Ok(v) = val.parse() {
                self.inactivity.time_for_inactivity_ms = v;
            }
        }
        if let Some(val) = lookup("USER_INACTIVITY_IS_ACTIVE") {
            if let Ok(v) = val.parse() {
                self.inactivity.is_active = Some(v);
            }
        }
        if let Some(val) = lookup("USER_INACTIVITY_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.inactivity.time_for_inactivity_ms == 0 {
            return Err(ConfigError::NonPositiveDelay(
                self.inactivity.time_for_inactivity(),
            ));
        }
        Ok(())
    }
}
