//! Credential exchange: provider credential + nonce in, session profile out.

use crate::nonce::NonceBroker;
use crate::profile::Profile;
use crate::transport::{ExchangeRequest, TransportResolver};
use crate::{AuthError, AuthResult};
use std::sync::Arc;
use tracing::{debug, info};

pub struct CredentialExchanger {
    transport: Arc<TransportResolver>,
    nonces: Arc<NonceBroker>,
}

impl CredentialExchanger {
    pub fn new(transport: Arc<TransportResolver>, nonces: Arc<NonceBroker>) -> Self {
        Self { transport, nonces }
    }

    /// Trade `raw` for a profile.
    ///
    /// Errors: `missing_credential` for an absent or blank credential (no
    /// network call), `nonce_failed` when no nonce can be obtained,
    /// `exchange_failed` for transport failures and `invalid_profile` when the
    /// service answers with something other than an object.
    pub async fn exchange_credential(&self, raw: Option<&str>) -> AuthResult<Profile> {
        let credential = match raw {
            Some(credential) if !credential.trim().is_empty() => credential,
            _ => return Err(AuthError::MissingCredential),
        };

        let nonce = match self.nonces.take_pending() {
            Some(nonce) => nonce,
            None => {
                debug!("No pending nonce, requesting a fresh one for exchange");
                self.nonces.request_nonce().await?
            }
        };

        let request = ExchangeRequest {
            google_id_token: credential.to_string(),
            nonce_token: nonce.as_str().to_string(),
        };
        let value = self
            .transport
            .exchange_credential(&request)
            .await
            .map_err(AuthError::exchange_failed)?;

        let profile = Profile::from_value(value)?;
        info!(user_id = ?profile.user_id(), "Credential exchanged");
        Ok(profile)
    }
}
