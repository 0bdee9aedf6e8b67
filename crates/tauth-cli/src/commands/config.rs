//! Configuration inspection.

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use serde_json::json;
use tauth_config::AuthConfig;

/// Print the validated configuration.
pub fn show_config(config: &AuthConfig, format: &OutputFormat) -> Result<()> {
    let log_level = config.log_level.clone();
    let config = config.validate().context("Invalid configuration")?;

    match format {
        OutputFormat::Text => {
            output::print_heading("TAuth configuration");
            output::print_row("Base URL", &config.base_url);
            output::print_row("Tenant", &config.tenant_id);
            output::print_row("Client ID", &config.client_id);
            output::print_row("Nonce", &config.nonce_url());
            output::print_row("Login", &config.login_url());
            output::print_row("Logout", &config.logout_url());
            output::print_row(
                "Timeout",
                &format!("{}s", config.request_timeout.as_secs()),
            );
            output::print_row("Log level", &log_level);
        }
        OutputFormat::Json => output::print_json(&json!({
            "base_url": config.base_url,
            "tenant_id": config.tenant_id,
            "client_id": config.client_id,
            "nonce_url": config.nonce_url(),
            "login_url": config.login_url(),
            "logout_url": config.logout_url(),
            "request_timeout_secs": config.request_timeout.as_secs(),
            "log_level": log_level,
            "button": config.button,
        })),
    }
    Ok(())
}
