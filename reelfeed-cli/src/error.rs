//! CLI error type.

use reelfeed::config::ConfigError;
use reelfeed::logging::LoggingError;
use reelfeed::preferences::PreferenceError;
use reelfeed::service::ServiceError;
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("Feed service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Preferences error: {0}")]
    Preferences(#[from] PreferenceError),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}
