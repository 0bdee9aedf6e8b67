//! Configuration, error types and logging setup shared by the TAuth crates.

mod config;
mod error;
mod json_layer;
mod logging;

pub use config::{
    default_config_path, AuthConfig, ButtonOptions, ControllerConfig, DEFAULT_BASE_URL,
    DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_LOG_LEVEL, DEFAULT_NONCE_PATH,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{ConfigError, ConfigResult};
pub use json_layer::{JsonLayer, LogEntry};
pub use logging::{init_logging_with, LogConfig};
