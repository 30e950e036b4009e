//! Configuration errors raised when a watchdog is assembled.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Misuse detected while configuring a watchdog.
///
/// Runtime conditions (gesture bursts, overlapping force-active toggles,
/// expiries racing teardown) are not errors and never surface here.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The inactivity delay must be strictly positive.
    #[error("inactivity delay must be greater than zero (got {0:?})")]
    NonPositiveDelay(Duration),

    /// `on_action` is required.
    #[error("an on_action callback is required")]
    MissingOnAction,

    /// The default scheduler needs a tokio runtime to spawn its timers on.
    #[error("no tokio runtime available for the default timeout scheduler")]
    NoRuntime,

    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
