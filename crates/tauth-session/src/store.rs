//! Auth state store.
//!
//! Single writer of [`AuthState`]. Every change goes through the auth FSM,
//! repeated notifications are suppressed, and recognized profile fields are
//! mirrored onto the host element.
//!
//! Each write holds the publish lock from the state commit until its event
//! has been emitted, so host attributes and the last event always agree with
//! the committed state. The lock is re-entrant: listeners may write back into
//! the store from inside an emit.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthStatus};
use crate::events::{AuthErrorDetail, AuthEvent, EventBroadcaster};
use crate::host::HostElement;
use crate::profile::{Profile, PROFILE_ATTRIBUTES};
use crate::{AuthError, AuthResult};
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot of the current auth state. `profile` is set iff authenticated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthState {
    pub status: AuthStatus,
    pub profile: Option<Profile>,
}

/// Options for [`AuthStateStore::mark_unauthenticated`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnauthenticatedOptions {
    /// Emit even when nothing changed.
    pub force: bool,
}

struct StoreInner {
    machine: AuthMachine,
    profile: Option<Profile>,
    profile_key: Option<String>,
    announced_unauthenticated: bool,
}

impl StoreInner {
    fn status(&self) -> AuthStatus {
        AuthStatus::from(self.machine.state())
    }

    fn transition(&mut self, input: &AuthMachineInput) -> AuthResult<AuthStatus> {
        let old_status = self.status();
        self.machine.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                self.machine.state()
            ))
        })?;
        let new_status = self.status();
        if old_status != new_status {
            debug!(
                old_state = ?old_status,
                new_state = ?new_status,
                "Auth state transition"
            );
        }
        Ok(new_status)
    }
}

pub struct AuthStateStore {
    inner: Mutex<StoreInner>,
    publish: ReentrantMutex<()>,
    host: Arc<dyn HostElement>,
    events: Arc<EventBroadcaster>,
}

impl AuthStateStore {
    pub fn new(host: Arc<dyn HostElement>, events: Arc<EventBroadcaster>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                machine: AuthMachine::new(),
                profile: None,
                profile_key: None,
                announced_unauthenticated: false,
            }),
            publish: ReentrantMutex::new(()),
            host,
            events,
        }
    }

    pub fn state(&self) -> AuthState {
        let inner = self.inner.lock();
        AuthState {
            status: inner.status(),
            profile: inner.profile.clone(),
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.lock().status()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.lock().profile.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status().is_authenticated()
    }

    /// Mark authenticated with `value`. Returns whether an event was emitted.
    ///
    /// A non-object value broadcasts `invalid_profile` and forces the store
    /// to unauthenticated.
    pub fn mark_authenticated(&self, value: Value) -> bool {
        self.try_mark_authenticated(value).unwrap_or(false)
    }

    /// Like [`mark_authenticated`](Self::mark_authenticated) but hands the
    /// `invalid_profile` error back after broadcasting it.
    pub fn try_mark_authenticated(&self, value: Value) -> AuthResult<bool> {
        let _publish = self.publish.lock();
        let profile = match Profile::from_value(value) {
            Ok(profile) => profile,
            Err(err) => {
                self.report_error(&err);
                self.apply_unauthenticated(
                    &AuthMachineInput::ProfileRejected,
                    UnauthenticatedOptions::default(),
                );
                return Err(err);
            }
        };

        let key = profile.canonical_key();
        {
            let mut inner = self.inner.lock();
            if inner.status().is_authenticated() && inner.profile_key.as_deref() == Some(&key) {
                debug!("Profile unchanged, skipping authenticated notification");
                return Ok(false);
            }
            inner.transition(&AuthMachineInput::ProfileAccepted)?;
            inner.profile = Some(profile.clone());
            inner.profile_key = Some(key);
        }

        self.reflect_profile(&profile);
        info!(user_id = ?profile.user_id(), "Session authenticated");
        self.events.emit(AuthEvent::Authenticated { profile });
        Ok(true)
    }

    /// Mark unauthenticated. Returns whether an event was emitted.
    ///
    /// Already unauthenticated with no profile emits nothing, except for the
    /// store's very first unauthenticated notification or when forced.
    pub fn mark_unauthenticated(&self, options: UnauthenticatedOptions) -> bool {
        self.apply_unauthenticated(&AuthMachineInput::SignedOut, options)
    }

    fn apply_unauthenticated(&self, input: &AuthMachineInput, options: UnauthenticatedOptions) -> bool {
        let _publish = self.publish.lock();
        let emit = {
            let mut inner = self.inner.lock();
            let unchanged = inner.status() == AuthStatus::Unauthenticated && inner.profile.is_none();
            if let Err(err) = inner.transition(input) {
                warn!(error = %err, "Could not mark unauthenticated");
                return false;
            }
            inner.profile = None;
            inner.profile_key = None;

            let emit = options.force || !unchanged || !inner.announced_unauthenticated;
            if emit {
                inner.announced_unauthenticated = true;
            }
            emit
        };

        self.clear_profile_attributes();
        if emit {
            info!("Session unauthenticated");
            self.events.emit(AuthEvent::Unauthenticated);
        } else {
            debug!("Already unauthenticated, skipping notification");
        }
        emit
    }

    /// Broadcast `err` as `auth:error`. The status is left as it was.
    pub fn report_error(&self, err: &AuthError) {
        let _publish = self.publish.lock();
        {
            let mut inner = self.inner.lock();
            if let Err(transition_err) = inner.transition(&AuthMachineInput::Failure) {
                warn!(error = %transition_err, "Could not record auth failure");
            }
        }
        warn!(code = err.code(), status = ?err.status(), "{}", err);
        self.events.emit(AuthEvent::Error(AuthErrorDetail::from(err)));
    }

    fn reflect_profile(&self, profile: &Profile) {
        for (field, attribute) in PROFILE_ATTRIBUTES {
            match profile.text(field) {
                Some(value) => self.host.set_attribute(attribute, &value),
                None => self.host.remove_attribute(attribute),
            }
        }
    }

    fn clear_profile_attributes(&self) {
        for (_, attribute) in PROFILE_ATTRIBUTES {
            self.host.remove_attribute(attribute);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Subscription;
    use crate::host::MemoryHostElement;
    use serde_json::json;

    struct Fixture {
        store: AuthStateStore,
        host: Arc<MemoryHostElement>,
        seen: Arc<Mutex<Vec<AuthEvent>>>,
        _sub: Subscription,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MemoryHostElement::new());
        let events = Arc::new(EventBroadcaster::new(Some(host.clone())));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = events.subscribe(move |event| sink.lock().push(event.clone()));
        Fixture {
            store: AuthStateStore::new(host.clone(), events),
            host,
            seen,
            _sub: sub,
        }
    }

    #[test]
    fn test_identical_profile_emits_once() {
        let Fixture { store, seen, _sub, .. } = fixture();

        assert!(store.mark_authenticated(json!({"user_id": "1", "display": "Ann"})));
        assert!(!store.mark_authenticated(json!({"display": "Ann", "user_id": "1"})));

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(store.status(), AuthStatus::Authenticated);
    }

    #[test]
    fn test_changed_profile_emits_again() {
        let Fixture { store, host, seen, _sub, .. } = fixture();

        store.mark_authenticated(json!({"user_id": "1", "display": "Ann"}));
        store.mark_authenticated(json!({"user_id": "1", "display": "Ann B."}));

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(host.attribute("data-user-display").as_deref(), Some("Ann B."));
    }

    #[test]
    fn test_repeated_unauthenticated_emits_once() {
        let Fixture { store, seen, _sub, .. } = fixture();

        for _ in 0..5 {
            store.mark_unauthenticated(UnauthenticatedOptions::default());
        }

        assert_eq!(*seen.lock(), vec![AuthEvent::Unauthenticated]);
    }

    #[test]
    fn test_forced_unauthenticated_always_emits() {
        let Fixture { store, seen, _sub, .. } = fixture();

        store.mark_unauthenticated(UnauthenticatedOptions::default());
        assert!(store.mark_unauthenticated(UnauthenticatedOptions { force: true }));

        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_profile_reflected_and_cleared() {
        let Fixture { store, host, _sub, .. } = fixture();

        store.mark_authenticated(json!({
            "user_id": "1",
            "user_email": "ann@example.com",
            "display": "Ann",
            "avatar_url": "https://cdn.example.com/ann.png",
            "plan": "pro"
        }));

        assert_eq!(host.attribute("data-user-id").as_deref(), Some("1"));
        assert_eq!(host.attribute("data-user-email").as_deref(), Some("ann@example.com"));
        assert_eq!(host.attribute("data-user-display").as_deref(), Some("Ann"));
        assert_eq!(
            host.attribute("data-user-avatar-url").as_deref(),
            Some("https://cdn.example.com/ann.png")
        );
        assert_eq!(host.attributes().len(), 4);

        store.mark_unauthenticated(UnauthenticatedOptions::default());
        assert!(host.attributes().is_empty());
        assert_eq!(store.state().profile, None);
    }

    #[test]
    fn test_invalid_profile_forces_unauthenticated() {
        let Fixture { store, host, seen, _sub, .. } = fixture();
        store.mark_authenticated(json!({"user_id": "1"}));

        let result = store.try_mark_authenticated(json!("not-a-profile"));
        assert!(matches!(result, Err(AuthError::InvalidProfile(_))));

        let state = store.state();
        assert_eq!(state.status, AuthStatus::Unauthenticated);
        assert!(state.profile.is_none());
        assert!(host.attribute("data-user-id").is_none());

        let seen = seen.lock();
        assert!(matches!(&seen[1], AuthEvent::Error(detail) if detail.code == "invalid_profile"));
        assert_eq!(seen[2], AuthEvent::Unauthenticated);
    }

    #[test]
    fn test_error_while_authenticated_keeps_profile() {
        let Fixture { store, _sub, .. } = fixture();
        store.mark_authenticated(json!({"user_id": "1"}));

        store.report_error(&AuthError::LogoutFailed {
            status: Some(500),
            message: "HTTP 500".into(),
        });

        let state = store.state();
        assert_eq!(state.status, AuthStatus::Authenticated);
        assert!(state.profile.is_some());
    }

    #[test]
    fn test_error_while_signed_out_stays_unauthenticated() {
        let Fixture { store, seen, _sub, .. } = fixture();
        store.mark_unauthenticated(UnauthenticatedOptions::default());

        store.report_error(&AuthError::MissingCredential);
        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        assert!(store.profile().is_none());
        assert!(!store.mark_unauthenticated(UnauthenticatedOptions::default()));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[1], AuthEvent::Error(detail) if detail.code == "missing_credential"));
    }

    #[test]
    fn test_listener_may_write_back_during_emit() {
        let host = Arc::new(MemoryHostElement::new());
        let events = Arc::new(EventBroadcaster::new(None));
        let store = Arc::new(AuthStateStore::new(host.clone(), events.clone()));

        let weak = Arc::downgrade(&store);
        let _sub = events.subscribe(move |event| {
            if let (AuthEvent::Authenticated { profile }, Some(store)) = (event, weak.upgrade()) {
                if profile.text("plan").is_none() {
                    let mut value = profile.to_value();
                    value["plan"] = json!("free");
                    store.mark_authenticated(value);
                }
            }
        });

        store.mark_authenticated(json!({"user_id": "1"}));

        assert_eq!(store.profile().and_then(|p| p.text("plan")).as_deref(), Some("free"));
    }

    #[test]
    fn test_concurrent_writers_leave_host_consistent() {
        let Fixture { store, host, seen, _sub } = fixture();

        std::thread::scope(|scope| {
            let store = &store;
            scope.spawn(move || {
                for i in 0..300 {
                    store.mark_authenticated(json!({"user_id": i.to_string(), "display": "Ann"}));
                }
            });
            scope.spawn(move || {
                for _ in 0..300 {
                    store.mark_unauthenticated(UnauthenticatedOptions::default());
                }
            });
        });

        let state = store.state();
        let last = seen.lock().last().cloned();
        match state.profile {
            Some(profile) => {
                assert_eq!(state.status, AuthStatus::Authenticated);
                assert_eq!(host.attribute("data-user-id"), profile.user_id());
                assert_eq!(last, Some(AuthEvent::Authenticated { profile }));
            }
            None => {
                assert_eq!(state.status, AuthStatus::Unauthenticated);
                assert!(host.attributes().is_empty());
                assert_eq!(last, Some(AuthEvent::Unauthenticated));
            }
        }
    }
}
