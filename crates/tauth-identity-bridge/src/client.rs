//! Identity-provider client surface consumed by the bridge.

use crate::BridgeResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tauth_config::ButtonOptions;

/// Payload the identity client hands back after the user picks an account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialResponse {
    /// Raw provider credential (an ID token). `None` when the provider returned nothing.
    pub credential: Option<String>,
    /// How the credential was selected (`btn`, `auto`, ...).
    pub select_by: Option<String>,
}

impl CredentialResponse {
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            credential: Some(credential.into()),
            select_by: Some("btn".to_string()),
        }
    }
}

/// Invoked by the identity client with each credential response.
pub type CredentialCallback = Arc<dyn Fn(CredentialResponse) + Send + Sync>;

/// One pending `initialize` call.
#[derive(Clone)]
pub struct InitConfig {
    pub client_id: String,
    pub nonce: String,
    pub callback: CredentialCallback,
}

impl fmt::Debug for InitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitConfig")
            .field("client_id", &self.client_id)
            .field("nonce", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// The most recent `{client_id, nonce}` handed to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastInitConfig {
    pub client_id: String,
    pub nonce: String,
}

impl From<&InitConfig> for LastInitConfig {
    fn from(config: &InitConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            nonce: config.nonce.clone(),
        }
    }
}

/// The two capabilities required from a loaded identity client.
pub trait IdentityClient: Send + Sync {
    /// Configure the client with an id, a nonce and the credential callback.
    fn initialize(&self, config: &InitConfig) -> BridgeResult<()>;

    /// Render the provider's sign-in button into `target`.
    fn render_button(&self, target: &str, options: &ButtonOptions) -> BridgeResult<()>;
}

/// Loads the identity client library.
///
/// Implementations perform the actual script injection or SDK start-up. The
/// bridge guarantees `load` runs at most once at a time.
#[async_trait]
pub trait IdentityScriptLoader: Send + Sync {
    /// A client that is already available without loading, if any.
    fn present(&self) -> Option<Arc<dyn IdentityClient>> {
        None
    }

    async fn load(&self) -> BridgeResult<Arc<dyn IdentityClient>>;
}

/// Loader for hosts where the client is already constructed.
pub struct PreloadedClient {
    client: Arc<dyn IdentityClient>,
}

impl PreloadedClient {
    pub fn new(client: Arc<dyn IdentityClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityScriptLoader for PreloadedClient {
    fn present(&self) -> Option<Arc<dyn IdentityClient>> {
        Some(self.client.clone())
    }

    async fn load(&self) -> BridgeResult<Arc<dyn IdentityClient>> {
        Ok(self.client.clone())
    }
}
