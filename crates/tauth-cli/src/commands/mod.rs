//! CLI command implementations.

mod config;
mod session;

pub use config::show_config;
pub use session::{exchange, logout, nonce};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tauth_config::{default_config_path, AuthConfig};
use tauth_session::AuthController;

/// Values given on the command line. They win over the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub log_level: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut AuthConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(tenant_id) = &self.tenant_id {
            config.tenant_id = Some(tenant_id.clone());
        }
        if let Some(client_id) = &self.client_id {
            config.client_id = Some(client_id.clone());
        }
        if let Some(log_level) = &self.log_level {
            config.log_level = log_level.clone();
        }
    }
}

/// Load the config file (if any), then environment, then command-line overrides.
pub fn load_config(overrides: &Overrides) -> Result<AuthConfig> {
    let path = match &overrides.config_path {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = AuthConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    overrides.apply(&mut config);
    Ok(config)
}

/// Build a controller backed by the headless identity client.
fn controller(config: AuthConfig) -> Result<Arc<AuthController>> {
    let controller = AuthController::builder(config, crate::headless::bridge())
        .build()
        .context("Invalid configuration")?;
    Ok(Arc::new(controller))
}
