//! Configuration.
//!
//! [`FeedConfig`] is what the controller consumes. [`ConfigFile`] is its
//! persisted INI form, edited by name through [`ConfigKey`].

mod file;
mod keys;
mod settings;

use thiserror::Error;

pub use file::{
    config_directory, config_file_path, ConfigFile, FeedSettings, LoggingSettings,
    NetworkSettings, RetrySettings, VisibilitySettings, DEFAULT_LOG_LEVEL,
};
pub use keys::{ConfigKey, MAX_RETRY_ATTEMPTS, MAX_WINDOW_RADIUS};
pub use settings::{FeedConfig, DEFAULT_PREFETCH_TRIGGER_DISTANCE};

/// Errors loading, saving or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(String),

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
