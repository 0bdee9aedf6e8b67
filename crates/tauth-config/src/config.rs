//! Configuration management for the session controller.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default session service URL (can be overridden at compile time via TAUTH_BASE_URL env var).
pub const DEFAULT_BASE_URL: &str = match option_env!("TAUTH_BASE_URL") {
    Some(url) => url,
    None => "https://auth.tauth.dev",
};

/// Default nonce issuance path.
pub const DEFAULT_NONCE_PATH: &str = "/auth/nonce";

/// Default credential exchange path.
pub const DEFAULT_LOGIN_PATH: &str = "/auth/google";

/// Default logout path.
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";

/// Default timeout applied by the fallback HTTP transport.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Options forwarded to the identity client when rendering its sign-in button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonOptions {
    #[serde(rename = "type", default = "default_button_type")]
    pub button_type: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_text")]
    pub text: String,
    #[serde(default = "default_shape")]
    pub shape: String,
    #[serde(default = "default_logo_alignment")]
    pub logo_alignment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

fn default_button_type() -> String {
    "standard".to_string()
}

fn default_theme() -> String {
    "outline".to_string()
}

fn default_size() -> String {
    "large".to_string()
}

fn default_text() -> String {
    "signin_with".to_string()
}

fn default_shape() -> String {
    "rectangular".to_string()
}

fn default_logo_alignment() -> String {
    "left".to_string()
}

impl Default for ButtonOptions {
    fn default() -> Self {
        Self {
            button_type: default_button_type(),
            theme: default_theme(),
            size: default_size(),
            text: default_text(),
            shape: default_shape(),
            logo_alignment: default_logo_alignment(),
            width: None,
        }
    }
}

/// Raw controller configuration as read from disk or assembled by a host.
///
/// Identifiers are optional here; [`AuthConfig::validate`] turns this into a
/// [`ControllerConfig`] and rejects missing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session service base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_nonce_path")]
    pub nonce_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    /// Identity-provider client id (the "site id" on the host element).
    #[serde(default)]
    pub client_id: Option<String>,
    /// Tenant sent as `X-TAuth-Tenant` on every fallback request.
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub button: ButtonOptions,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_nonce_path() -> String {
    DEFAULT_NONCE_PATH.to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_logout_path() -> String {
    DEFAULT_LOGOUT_PATH.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            nonce_path: default_nonce_path(),
            login_path: default_login_path(),
            logout_path: default_logout_path(),
            client_id: None,
            tenant_id: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_level: default_log_level(),
            button: ButtonOptions::default(),
        }
    }
}

/// Default config file location (`<config dir>/tauth/config.json`).
pub fn default_config_path() -> ConfigResult<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| ConfigError::Path("Could not determine config directory".to_string()))?;
    Ok(base.join("tauth").join("config.json"))
}

impl AuthConfig {
    /// Create a config with the two required identifiers and defaults elsewhere.
    pub fn new(client_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            tenant_id: Some(tenant_id.into()),
            ..Self::default()
        }
    }

    /// Set the session service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Load configuration from `path` if it exists, then apply `TAUTH_*`
    /// environment overrides.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Like [`load`](Self::load) with overrides read from `lookup`.
    pub fn load_with<F>(path: &Path, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AuthConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from an arbitrary variable source. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).and_then(non_empty);

        if let Some(base_url) = get("TAUTH_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(tenant_id) = get("TAUTH_TENANT_ID") {
            self.tenant_id = Some(tenant_id);
        }
        if let Some(client_id) = get("TAUTH_CLIENT_ID") {
            self.client_id = Some(client_id);
        }
        if let Some(log_level) = get("TAUTH_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(timeout) = get("TAUTH_REQUEST_TIMEOUT_SECS").and_then(|raw| raw.parse().ok()) {
            self.request_timeout_secs = timeout;
        }
    }

    /// Get the base URL as a parsed URL.
    pub fn base_url(&self) -> ConfigResult<Url> {
        Url::parse(self.base_url.trim()).map_err(ConfigError::from)
    }

    /// Check required fields and normalize endpoints.
    pub fn validate(&self) -> ConfigResult<ControllerConfig> {
        let tenant_id = self
            .tenant_id
            .clone()
            .and_then(non_empty)
            .ok_or(ConfigError::TenantIdRequired)?;
        let client_id = self
            .client_id
            .clone()
            .and_then(non_empty)
            .ok_or(ConfigError::ClientIdRequired)?;

        self.base_url()?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(ControllerConfig {
            base_url: self.base_url.trim().trim_end_matches('/').to_string(),
            nonce_path: normalize_path(&self.nonce_path),
            login_path: normalize_path(&self.login_path),
            logout_path: normalize_path(&self.logout_path),
            client_id,
            tenant_id,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            button: self.button.clone(),
        })
    }
}

/// Validated configuration consumed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub nonce_path: String,
    pub login_path: String,
    pub logout_path: String,
    pub client_id: String,
    pub tenant_id: String,
    pub request_timeout: Duration,
    pub button: ButtonOptions,
}

impl ControllerConfig {
    /// Absolute URL for a configured path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn nonce_url(&self) -> String {
        self.endpoint(&self.nonce_path)
    }

    pub fn login_url(&self) -> String {
        self.endpoint(&self.login_path)
    }

    pub fn logout_url(&self) -> String {
        self.endpoint(&self.logout_path)
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
