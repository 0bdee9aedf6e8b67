//! Identity client for terminals: there is no button to render, credentials
//! arrive on the command line instead.

use std::sync::Arc;
use tauth_config::ButtonOptions;
use tauth_identity_bridge::{BridgeResult, IdentityBridge, IdentityClient, InitConfig, PreloadedClient};
use tracing::debug;

pub struct HeadlessClient;

impl IdentityClient for HeadlessClient {
    fn initialize(&self, config: &InitConfig) -> BridgeResult<()> {
        debug!(client_id = %config.client_id, "Headless identity client initialized");
        Ok(())
    }

    fn render_button(&self, target: &str, _options: &ButtonOptions) -> BridgeResult<()> {
        debug!(target, "Headless identity client has no button to render");
        Ok(())
    }
}

pub fn bridge() -> Arc<IdentityBridge> {
    Arc::new(IdentityBridge::new(Arc::new(PreloadedClient::new(Arc::new(
        HeadlessClient,
    )))))
}
