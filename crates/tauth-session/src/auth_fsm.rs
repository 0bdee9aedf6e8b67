//! Authentication state machine using rust-fsm.
//!
//! The store drives every status change through this machine so that the
//! public [`AuthStatus`] is always derived from one explicit state.
//!
//! ## State Diagram
//!
//! ```text
//!                 ProfileAccepted
//! ┌─────────────────┐ ─────────────────────► ┌─────────────────┐
//! │ Unauthenticated │ (initial)              │  Authenticated  │ ◄─┐ ProfileAccepted
//! └─────────────────┘ ◄───────────────────── └─────────────────┘ ──┘ Failure
//!   ▲    │             SignedOut / ProfileRejected
//!   └────┘
//!   Failure / SignedOut / ProfileRejected
//! ```
//!
//! `Failure` never changes the status. A failure while signed out stays
//! unauthenticated; a failure while authenticated (e.g. a logout that never
//! reached the server) keeps the session. The error itself is only broadcast.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Unauthenticated)

    Unauthenticated => {
        ProfileAccepted => Authenticated,
        ProfileRejected => Unauthenticated,
        SignedOut => Unauthenticated,
        Failure => Unauthenticated
    },
    Authenticated => {
        // Re-authentication with a new or refreshed profile
        ProfileAccepted => Authenticated,
        ProfileRejected => Unauthenticated,
        SignedOut => Unauthenticated,
        Failure => Authenticated
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Public authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Unauthenticated,
    Authenticated,
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated)
    }
}

impl From<&AuthMachineState> for AuthStatus {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Unauthenticated => AuthStatus::Unauthenticated,
            AuthMachineState::Authenticated => AuthStatus::Authenticated,
        }
    }
}
