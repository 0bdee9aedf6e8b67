//! Authentication error types.

use tauth_config::ConfigError;
use tauth_identity_bridge::BridgeError;
use thiserror::Error;

/// Text a host helper uses to signal it has no base configuration.
pub const MISSING_BASE_CONFIG_MARKER: &str = "missing base configuration";

/// Error raised by a session transport (host helper or HTTP fallback).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The host helper exists but is not configured; the HTTP fallback applies.
    #[error("Session helper is missing base configuration")]
    MissingBaseConfig,

    /// The host helper does not implement this operation; the HTTP fallback applies.
    #[error("Session helper does not support {0}")]
    Unsupported(&'static str),

    /// The session service answered with a non-success status.
    #[error("HTTP {status}: {body_summary}")]
    Status { status: u16, body_summary: String },

    /// Connection-level failure, including the configured timeout.
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Any other host helper failure.
    #[error("Session helper failed: {0}")]
    Helper(String),
}

impl TransportError {
    /// Classify a free-form helper failure message.
    pub fn from_helper_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_lowercase().contains(MISSING_BASE_CONFIG_MARKER) {
            TransportError::MissingBaseConfig
        } else {
            TransportError::Helper(message)
        }
    }

    /// Whether the resolver should retry this operation over HTTP.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            TransportError::MissingBaseConfig | TransportError::Unsupported(_)
        )
    }

    /// HTTP status, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::InvalidResponse(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Authentication error type.
///
/// Every variant maps to a stable code (see [`AuthError::code`]) that is
/// broadcast in `auth:error` notifications.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The identity client returned no credential.
    #[error("Credential is missing")]
    MissingCredential,

    /// A profile was not a key/value object.
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Nonce request failed: {message}")]
    NonceFailed { status: Option<u16>, message: String },

    #[error("Credential exchange failed: {message}")]
    ExchangeFailed { status: Option<u16>, message: String },

    /// The host session hook failed.
    #[error("Session bootstrap failed: {0}")]
    BootstrapFailed(String),

    #[error("Identity client unavailable: {0}")]
    GoogleUnavailable(String),

    #[error("Identity button render failed: {0}")]
    GoogleRenderFailed(String),

    #[error("Identity script failed to load: {0}")]
    GoogleScriptFailed(String),

    #[error("Logout failed: {message}")]
    LogoutFailed { status: Option<u16>, message: String },

    #[error("Tenant id is required")]
    TenantIdRequired,

    #[error("Identity client id is required")]
    ClientIdRequired,

    /// Other configuration problems (bad URL, zero timeout).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid state transition in the auth FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),
}

impl AuthError {
    pub fn nonce_failed(e: TransportError) -> Self {
        AuthError::NonceFailed {
            status: e.status(),
            message: e.to_string(),
        }
    }

    pub fn exchange_failed(e: TransportError) -> Self {
        AuthError::ExchangeFailed {
            status: e.status(),
            message: e.to_string(),
        }
    }

    pub fn logout_failed(e: TransportError) -> Self {
        AuthError::LogoutFailed {
            status: e.status(),
            message: e.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidProfile(_) => "invalid_profile",
            AuthError::NonceFailed { .. } => "nonce_failed",
            AuthError::ExchangeFailed { .. } => "exchange_failed",
            AuthError::BootstrapFailed(_) => "bootstrap_failed",
            AuthError::GoogleUnavailable(_) => "google_unavailable",
            AuthError::GoogleRenderFailed(_) => "google_render_failed",
            AuthError::GoogleScriptFailed(_) => "google_script_failed",
            AuthError::LogoutFailed { .. } => "logout_failed",
            AuthError::TenantIdRequired => "tenant_id_required",
            AuthError::ClientIdRequired => "google_site_id_required",
            AuthError::Config(_) => "invalid_config",
            AuthError::InvalidStateTransition(_) => "invalid_state_transition",
        }
    }

    /// HTTP status attached to transport-backed failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::NonceFailed { status, .. }
            | AuthError::ExchangeFailed { status, .. }
            | AuthError::LogoutFailed { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::TenantIdRequired => AuthError::TenantIdRequired,
            ConfigError::ClientIdRequired => AuthError::ClientIdRequired,
            other => AuthError::Config(other.to_string()),
        }
    }
}

impl From<BridgeError> for AuthError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::ScriptFailed(msg) => AuthError::GoogleScriptFailed(msg),
            BridgeError::RenderFailed(msg) => AuthError::GoogleRenderFailed(msg),
            BridgeError::Unavailable(msg) | BridgeError::InitializeFailed(msg) => {
                AuthError::GoogleUnavailable(msg)
            }
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
