//! Session commands.

use super::controller;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use serde_json::json;
use tauth_config::AuthConfig;
use tauth_session::HttpTransport;
use tracing::info;

/// Issue a nonce directly from the session service.
pub async fn nonce(config: &AuthConfig, format: &OutputFormat) -> Result<()> {
    let config = config
        .validate()
        .context("Invalid configuration")?;
    let transport = HttpTransport::new(&config).context("Failed to create HTTP client")?;

    let token = transport
        .request_nonce()
        .await
        .context("Nonce request failed")?;

    match format {
        OutputFormat::Text => println!("{}", token.as_str()),
        OutputFormat::Json => output::print_json(&json!({ "nonce": token })),
    }
    Ok(())
}

/// Exchange a credential and print the resulting session.
pub async fn exchange(config: AuthConfig, credential: &str, format: &OutputFormat) -> Result<()> {
    let controller = controller(config)?;

    let profile = controller
        .handle_credential(Some(credential.to_string()))
        .await
        .context("Credential exchange failed")?;
    info!(user_id = ?profile.user_id(), "Signed in from CLI");

    let state = controller.state();
    match format {
        OutputFormat::Text => {
            output::print_heading("Signed in");
            output::print_row("Status", &format!("{:?}", state.status));
            output::print_row("User ID", &profile.user_id().unwrap_or_default());
            output::print_row("Display", &profile.display().unwrap_or_default());
            if let Some(email) = profile.text("user_email") {
                output::print_row("Email", &email);
            }
        }
        OutputFormat::Json => output::print_json(&state),
    }
    Ok(())
}

/// End the session on the session service.
pub async fn logout(config: AuthConfig, format: &OutputFormat) -> Result<()> {
    let controller = controller(config)?;

    controller.logout().await.context("Logout failed")?;

    output::print_success("Logged out successfully", format);
    Ok(())
}
