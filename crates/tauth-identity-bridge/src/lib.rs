//! Identity-provider client bridge.
//!
//! Loads the provider's client library at most once per bridge and queues
//! `initialize` calls made before it is ready.

mod bridge;
mod client;
mod error;

pub use bridge::IdentityBridge;
pub use client::{
    CredentialCallback, CredentialResponse, IdentityClient, IdentityScriptLoader, InitConfig,
    LastInitConfig, PreloadedClient,
};
pub use error::{BridgeError, BridgeResult};
