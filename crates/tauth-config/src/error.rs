//! Configuration error types.

use thiserror::Error;

/// Error raised while loading or validating controller configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No tenant id was supplied.
    #[error("Tenant id is required")]
    TenantIdRequired,

    /// No identity-provider client id was supplied.
    #[error("Identity client id is required")]
    ClientIdRequired,

    /// A configured value is malformed.
    #[error("Configuration error: {0}")]
    Invalid(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., config directory not found)
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
