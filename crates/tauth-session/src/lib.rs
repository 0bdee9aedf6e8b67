//! Session authentication controller.
//!
//! Turns an identity-provider credential into an authenticated session,
//! keeps that session consistent across independently mounted widgets, and
//! falls back to direct HTTP when host transport helpers are absent.
//!
//! ```text
//!  widget ──► WidgetMountCoordinator ──► AuthController
//!                                          ├─ SessionBootstrapper ──► SessionHook (host)
//!                                          ├─ NonceBroker ──┐
//!                                          ├─ CredentialExchanger ──► TransportResolver ──► helper | HTTP
//!                                          ├─ IdentityBridge (shared)
//!                                          └─ AuthStateStore ──► EventBroadcaster ──► listeners, host element
//! ```

pub mod auth_fsm;
pub mod bootstrap;
pub mod controller;
mod error;
pub mod events;
pub mod exchange;
pub mod host;
pub mod mount;
pub mod nonce;
pub mod profile;
pub mod store;
pub mod transport;

pub use auth_fsm::AuthStatus;
pub use bootstrap::{HookError, RestoreRequest, SessionCallbacks, SessionHook};
pub use controller::{AuthController, AuthControllerBuilder};
pub use error::{AuthError, AuthResult, TransportError, MISSING_BASE_CONFIG_MARKER};
pub use events::{
    AuthErrorDetail, AuthEvent, Subscription, AUTHENTICATED_EVENT, ERROR_EVENT,
    UNAUTHENTICATED_EVENT,
};
pub use host::{DispatchedEvent, HostElement, MemoryHostElement};
pub use mount::{ButtonPhase, MountOutcome, MountedButton, RenderToken, WidgetKind, WidgetMountCoordinator};
pub use nonce::NonceToken;
pub use profile::Profile;
pub use store::{AuthState, UnauthenticatedOptions};
pub use transport::{
    ExchangeRequest, HttpTransport, SessionTransportHelper, TransportContext, TENANT_HEADER,
};

pub use tauth_config::{AuthConfig, ButtonOptions, ControllerConfig};
pub use tauth_identity_bridge::{
    CredentialResponse, IdentityBridge, IdentityClient, IdentityScriptLoader, PreloadedClient,
};
