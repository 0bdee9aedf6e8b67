//! Auth controller facade.
//!
//! One [`AuthController`] owns the nonce broker, transport resolver,
//! exchanger, bootstrapper, state store and event broadcaster of a single
//! controller instance. The identity bridge is shared and injected.

use crate::bootstrap::{RestoreRequest, SessionBootstrapper, SessionHook};
use crate::events::{AuthEvent, EventBroadcaster, Subscription};
use crate::exchange::CredentialExchanger;
use crate::host::{HostElement, MemoryHostElement};
use crate::nonce::{NonceBroker, NonceToken};
use crate::profile::Profile;
use crate::store::{AuthState, AuthStateStore, UnauthenticatedOptions};
use crate::transport::{SessionTransportHelper, TransportResolver};
use crate::{AuthError, AuthResult};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tauth_config::{AuthConfig, ControllerConfig};
use tauth_identity_bridge::{
    CredentialCallback, CredentialResponse, IdentityBridge, IdentityClient, InitConfig,
};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Builder for [`AuthController`].
pub struct AuthControllerBuilder {
    config: AuthConfig,
    identity: Arc<IdentityBridge>,
    host: Option<Arc<dyn HostElement>>,
    helper: Option<Arc<dyn SessionTransportHelper>>,
    hook: Option<Arc<dyn SessionHook>>,
}

impl AuthControllerBuilder {
    pub fn new(config: AuthConfig, identity: Arc<IdentityBridge>) -> Self {
        Self {
            config,
            identity,
            host: None,
            helper: None,
            hook: None,
        }
    }

    /// Element that receives profile attributes and forwarded events.
    pub fn host(mut self, host: Arc<dyn HostElement>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn transport_helper(mut self, helper: Arc<dyn SessionTransportHelper>) -> Self {
        self.helper = Some(helper);
        self
    }

    pub fn session_hook(mut self, hook: Arc<dyn SessionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Validate the configuration and assemble the controller.
    ///
    /// Fails with `tenant_id_required`, `google_site_id_required` or
    /// `invalid_config`. Nothing is broadcast for construction errors.
    pub fn build(self) -> AuthResult<AuthController> {
        let config = self.config.validate()?;

        let host = self
            .host
            .unwrap_or_else(|| Arc::new(MemoryHostElement::new()));
        let events = Arc::new(EventBroadcaster::new(Some(host.clone())));
        let store = Arc::new(AuthStateStore::new(host.clone(), events.clone()));

        let transport = Arc::new(
            TransportResolver::new(&config, self.helper)
                .map_err(|e| AuthError::Config(e.to_string()))?,
        );
        let nonces = Arc::new(NonceBroker::new(transport.clone()));
        let exchanger = CredentialExchanger::new(transport.clone(), nonces.clone());
        let bootstrapper = SessionBootstrapper::new(
            self.hook,
            store.clone(),
            RestoreRequest {
                base_url: config.base_url.clone(),
                tenant_id: config.tenant_id.clone(),
            },
        );

        info!(
            tenant_id = %config.tenant_id,
            base_url = %config.base_url,
            helper = transport.has_helper(),
            hook = bootstrapper.has_hook(),
            "Auth controller created"
        );

        Ok(AuthController {
            config,
            identity: self.identity,
            host,
            events,
            store,
            transport,
            nonces,
            exchanger,
            bootstrapper,
        })
    }
}

/// Session authentication controller.
pub struct AuthController {
    config: ControllerConfig,
    identity: Arc<IdentityBridge>,
    host: Arc<dyn HostElement>,
    events: Arc<EventBroadcaster>,
    store: Arc<AuthStateStore>,
    transport: Arc<TransportResolver>,
    nonces: Arc<NonceBroker>,
    exchanger: CredentialExchanger,
    bootstrapper: SessionBootstrapper,
}

impl AuthController {
    pub fn builder(config: AuthConfig, identity: Arc<IdentityBridge>) -> AuthControllerBuilder {
        AuthControllerBuilder::new(config, identity)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn identity(&self) -> &Arc<IdentityBridge> {
        &self.identity
    }

    pub fn host(&self) -> &Arc<dyn HostElement> {
        &self.host
    }

    /// Register a synchronous listener for every auth notification.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Channel receiver for async consumers.
    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.channel()
    }

    pub fn state(&self) -> AuthState {
        self.store.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn has_pending_nonce(&self) -> bool {
        self.nonces.has_pending()
    }

    /// Bootstrap the session and warm up the identity client concurrently.
    ///
    /// Bootstrap never fails; the returned error is the identity client's.
    pub async fn start(&self) -> AuthResult<()> {
        let ((), identity) = tokio::join!(self.bootstrap(), self.ensure_identity());
        identity.map(|_| ())
    }

    pub async fn bootstrap(&self) {
        self.bootstrapper.bootstrap().await;
    }

    /// Resolve the shared identity client. Failures are broadcast.
    pub async fn ensure_identity(&self) -> AuthResult<Arc<dyn IdentityClient>> {
        match self.identity.ensure_client_ready().await {
            Ok(client) => Ok(client),
            Err(e) => self.fail(AuthError::from(e)),
        }
    }

    /// Prepare a nonce and queue an identity-client initialization whose
    /// credential callback feeds [`handle_credential`](Self::handle_credential).
    ///
    /// The callback only holds a weak reference to the controller and spawns
    /// the exchange on the runtime that prepared the sign-in.
    pub async fn prepare_sign_in(self: &Arc<Self>) -> AuthResult<NonceToken> {
        let controller = Arc::downgrade(self);
        let callback = spawning_callback(move |credential| {
            let controller = controller.clone();
            async move {
                let Some(controller) = controller.upgrade() else {
                    debug!("Credential received after controller was dropped");
                    return;
                };
                // Failures are already broadcast as auth:error
                let _ = controller.handle_credential(credential).await;
            }
        });
        self.prepare_sign_in_with(callback).await
    }

    /// Like [`prepare_sign_in`](Self::prepare_sign_in) with a caller-supplied
    /// credential callback.
    pub(crate) async fn prepare_sign_in_with(
        &self,
        callback: CredentialCallback,
    ) -> AuthResult<NonceToken> {
        let nonce = match self.nonces.prepare_nonce().await {
            Ok(nonce) => nonce,
            Err(e) => return self.fail(e),
        };

        let init = InitConfig {
            client_id: self.config.client_id.clone(),
            nonce: nonce.as_str().to_string(),
            callback,
        };
        if let Err(e) = self.identity.enqueue_initialize(init) {
            return self.fail(AuthError::from(e));
        }
        Ok(nonce)
    }

    /// Render the identity provider's button into `target`.
    pub async fn render_sign_in_button(&self, target: &str) -> AuthResult<()> {
        let client = self.ensure_identity().await?;
        self.render_button_with(&client, target)
    }

    pub(crate) fn render_button_with(
        &self,
        client: &Arc<dyn IdentityClient>,
        target: &str,
    ) -> AuthResult<()> {
        debug!(target, "Rendering sign-in button");
        match client.render_button(target, &self.config.button) {
            Ok(()) => Ok(()),
            Err(e) => self.fail(AuthError::GoogleRenderFailed(e.to_string())),
        }
    }

    /// Exchange a raw provider credential and authenticate with the result.
    ///
    /// Any failure is broadcast and leaves the controller unauthenticated.
    pub async fn handle_credential(&self, credential: Option<String>) -> AuthResult<Profile> {
        match self.exchanger.exchange_credential(credential.as_deref()).await {
            Ok(profile) => {
                self.bootstrapper.record_exchange(&profile);
                self.store.try_mark_authenticated(profile.to_value())?;
                Ok(profile)
            }
            Err(e) => {
                self.store.report_error(&e);
                self.store
                    .mark_unauthenticated(UnauthenticatedOptions::default());
                Err(e)
            }
        }
    }

    /// End the session. A failed logout keeps the session and broadcasts
    /// `logout_failed`.
    pub async fn logout(&self) -> AuthResult<()> {
        match self.transport.logout().await.map_err(AuthError::logout_failed) {
            Ok(()) => {
                self.nonces.discard_pending();
                self.bootstrapper.clear_fragment();
                self.store
                    .mark_unauthenticated(UnauthenticatedOptions::default());
                info!("Logged out");
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn mark_authenticated(&self, profile: Value) -> bool {
        self.store.mark_authenticated(profile)
    }

    pub fn mark_unauthenticated(&self, options: UnauthenticatedOptions) -> bool {
        self.store.mark_unauthenticated(options)
    }

    pub fn report_error(&self, err: &AuthError) {
        self.store.report_error(err);
    }

    /// Broadcast `err` and hand it back. The status is left as it was.
    fn fail<T>(&self, err: AuthError) -> AuthResult<T> {
        self.store.report_error(&err);
        Err(err)
    }
}

/// Credential callback that runs `handler` on the runtime current at
/// creation time. Identity clients call back synchronously.
pub(crate) fn spawning_callback<F, Fut>(handler: F) -> CredentialCallback
where
    F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = Handle::try_current().ok();
    Arc::new(move |response: CredentialResponse| {
        let Some(handle) = &handle else {
            warn!("No runtime available to process credential");
            return;
        };
        handle.spawn(handler(response.credential));
    })
}
