//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating settings.
///
/// All of them are fatal at startup: the daemon reports the error once and
/// never enters its control loop.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON for the settings schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
