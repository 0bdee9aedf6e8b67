//! Widget mount coordination.
//!
//! Each mounted widget owns a render epoch. Every render bumps it, and every
//! asynchronous step captures a [`RenderToken`] first and re-checks it before
//! touching the widget. A step whose token went stale (a newer render, or
//! `detach`) finishes silently without applying its result.
//!
//! The sign-in control's credential callback is supplied from here, so a
//! real credential submission carries the token of the render that mounted
//! the control.

use crate::controller::{spawning_callback, AuthController};
use crate::events::{AuthErrorDetail, AuthEvent};
use crate::profile::Profile;
use crate::AuthResult;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tauth_identity_bridge::CredentialCallback;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    /// Shows the signed-in display name once authenticated.
    HeaderButton,
    /// Hidden once authenticated.
    LoginButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPhase {
    Ready,
    Submitting,
    Completed,
    Failed,
}

/// The sign-in control currently mounted in a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedButton {
    pub epoch: u64,
    pub target: String,
    pub phase: ButtonPhase,
}

/// Result of one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted(MountedButton),
    SignedIn { display: Option<String> },
    Hidden,
    /// A newer render or a detach happened while this one was in flight.
    Superseded,
    Failed(AuthErrorDetail),
}

/// Epoch captured at the start of an asynchronous step.
#[derive(Debug, Clone)]
pub struct RenderToken {
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl RenderToken {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }
}

/// Render epoch and mounted control, shared with credential callbacks.
#[derive(Clone)]
struct ButtonSlot {
    epoch: Arc<AtomicU64>,
    mounted: Arc<Mutex<Option<MountedButton>>>,
}

impl ButtonSlot {
    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn token(&self) -> RenderToken {
        RenderToken {
            epoch: self.current_epoch(),
            current: self.epoch.clone(),
        }
    }

    fn advance(&self) -> RenderToken {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        RenderToken {
            epoch,
            current: self.epoch.clone(),
        }
    }

    fn superseded(&self, token: &RenderToken, step: &str) -> bool {
        if token.is_current() {
            return false;
        }
        debug!(
            epoch = token.epoch(),
            current = self.current_epoch(),
            step,
            "Discarding stale render step"
        );
        true
    }

    fn set_phase(&self, token: &RenderToken, phase: ButtonPhase) {
        if self.superseded(token, "set_phase") {
            return;
        }
        if let Some(button) = self.mounted.lock().as_mut() {
            if button.epoch == token.epoch() {
                button.phase = phase;
            }
        }
    }

    /// The exchange always runs to completion, but its outcome only touches
    /// the control mounted under `token`.
    async fn submit(
        &self,
        controller: &AuthController,
        token: &RenderToken,
        credential: Option<String>,
    ) -> AuthResult<Profile> {
        self.set_phase(token, ButtonPhase::Submitting);

        let result = controller.handle_credential(credential).await;

        let phase = match &result {
            Ok(_) => ButtonPhase::Completed,
            Err(_) => ButtonPhase::Failed,
        };
        self.set_phase(token, phase);
        result
    }
}

pub struct WidgetMountCoordinator {
    kind: WidgetKind,
    target: String,
    controller: Arc<AuthController>,
    slot: ButtonSlot,
}

impl WidgetMountCoordinator {
    pub fn new(kind: WidgetKind, target: impl Into<String>, controller: Arc<AuthController>) -> Self {
        Self {
            kind,
            target: target.into(),
            controller,
            slot: ButtonSlot {
                epoch: Arc::new(AtomicU64::new(0)),
                mounted: Arc::new(Mutex::new(None)),
            },
        }
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn current_epoch(&self) -> u64 {
        self.slot.current_epoch()
    }

    pub fn mounted(&self) -> Option<MountedButton> {
        self.slot.mounted.lock().clone()
    }

    /// Render the widget for the current auth state.
    pub async fn render(&self) -> MountOutcome {
        let token = self.slot.advance();

        let state = self.controller.state();
        if let Some(profile) = state.profile.filter(|_| state.status.is_authenticated()) {
            *self.slot.mounted.lock() = None;
            return match self.kind {
                WidgetKind::HeaderButton => MountOutcome::SignedIn {
                    display: profile.display(),
                },
                WidgetKind::LoginButton => MountOutcome::Hidden,
            };
        }

        let prepared = self
            .controller
            .prepare_sign_in_with(self.credential_callback(&token))
            .await;
        if self.slot.superseded(&token, "prepare_sign_in") {
            return MountOutcome::Superseded;
        }
        if let Err(e) = prepared {
            return MountOutcome::Failed(AuthErrorDetail::from(&e));
        }

        let client = self.controller.ensure_identity().await;
        if self.slot.superseded(&token, "ensure_identity") {
            return MountOutcome::Superseded;
        }
        let client = match client {
            Ok(client) => client,
            Err(e) => return MountOutcome::Failed(AuthErrorDetail::from(&e)),
        };

        if let Err(e) = self.controller.render_button_with(&client, &self.target) {
            return MountOutcome::Failed(AuthErrorDetail::from(&e));
        }

        let button = MountedButton {
            epoch: token.epoch(),
            target: self.target.clone(),
            phase: ButtonPhase::Ready,
        };
        *self.slot.mounted.lock() = Some(button.clone());
        MountOutcome::Mounted(button)
    }

    /// Callback handed to the identity client for the control mounted under `token`.
    fn credential_callback(&self, token: &RenderToken) -> CredentialCallback {
        let controller = Arc::downgrade(&self.controller);
        let slot = self.slot.clone();
        let token = token.clone();
        spawning_callback(move |credential| {
            let controller = controller.clone();
            let slot = slot.clone();
            let token = token.clone();
            async move {
                let Some(controller) = controller.upgrade() else {
                    debug!("Credential received after controller was dropped");
                    return;
                };
                // Failures are already broadcast as auth:error
                let _ = slot.submit(&controller, &token, credential).await;
            }
        })
    }

    /// Re-render after the host changed the widget's attributes.
    pub async fn update(&self) -> MountOutcome {
        self.render().await
    }

    /// Invalidate in-flight work and forget the mounted control.
    pub fn detach(&self) {
        let token = self.slot.advance();
        *self.slot.mounted.lock() = None;
        debug!(epoch = token.epoch(), target = %self.target, "Widget detached");
    }

    /// Submit a credential for the control mounted by the current render.
    pub async fn submit_credential(&self, credential: Option<String>) -> AuthResult<Profile> {
        let token = self.slot.token();
        self.slot.submit(&self.controller, &token, credential).await
    }

    /// Re-render on every authenticated/unauthenticated notification until
    /// the coordinator is dropped or the controller goes away.
    pub fn watch(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.controller.events();
        let coordinator: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let rerender = match events.recv().await {
                    Ok(AuthEvent::Authenticated { .. }) | Ok(AuthEvent::Unauthenticated) => true,
                    Ok(AuthEvent::Error(_)) => false,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Widget fell behind auth events, re-rendering");
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                if !rerender {
                    continue;
                }
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                coordinator.render().await;
            }
        })
    }
}
