//! Identity bridge error types.

use thiserror::Error;

/// Errors raised while loading or driving the identity-provider client.
///
/// `Clone` because a single script load is awaited by every concurrent caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The identity script could not be loaded.
    #[error("Identity script failed to load: {0}")]
    ScriptFailed(String),

    /// The bridge was reset while a load was in flight.
    #[error("Identity client unavailable: {0}")]
    Unavailable(String),

    /// `initialize` rejected a queued configuration.
    #[error("Identity client initialization failed: {0}")]
    InitializeFailed(String),

    /// `renderButton` failed for a target.
    #[error("Identity button render failed: {0}")]
    RenderFailed(String),
}

/// Result type alias using BridgeError.
pub type BridgeResult<T> = Result<T, BridgeError>;
