//! Session restore on start-up.
//!
//! Hosts that can restore an existing session implement [`SessionHook`]. The
//! hook reports back through [`SessionCallbacks`], possibly long after
//! `restore` was called.
//!
//! Ordering with direct credential exchanges:
//! - an exchanged profile is kept as the pending fragment; a later
//!   `on_authenticated` merges it with the hook's profile, hook fields winning;
//! - a late `on_unauthenticated` from a restore that started before an
//!   exchange succeeded is ignored.

use crate::profile::Profile;
use crate::store::{AuthStateStore, UnauthenticatedOptions};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Error type returned by host hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// What the hook is told about the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub base_url: String,
    pub tenant_id: String,
}

/// Outcome channel handed to a [`SessionHook`].
pub trait SessionCallbacks: Send + Sync {
    /// Report a restored session. Fails with `invalid_profile` for non-objects.
    fn on_authenticated(&self, profile: Value) -> AuthResult<()>;

    /// Report that no session exists.
    fn on_unauthenticated(&self) -> AuthResult<()>;
}

/// Host-supplied session restore.
#[async_trait]
pub trait SessionHook: Send + Sync {
    async fn restore(
        &self,
        request: RestoreRequest,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<(), HookError>;
}

struct HookCallbacks {
    store: Arc<AuthStateStore>,
    fragment: Arc<Mutex<Option<Profile>>>,
    exchanges: Arc<AtomicU64>,
    started_at: u64,
}

impl SessionCallbacks for HookCallbacks {
    fn on_authenticated(&self, profile: Value) -> AuthResult<()> {
        let fragment = self.fragment.lock().clone();
        let merged = match (fragment, profile) {
            (Some(fragment), Value::Object(map)) => {
                debug!("Merging pending profile fragment into restored session");
                fragment.merged_with(&Profile::from_map(map)).into_value()
            }
            (_, value) => value,
        };
        self.store.try_mark_authenticated(merged)?;
        Ok(())
    }

    fn on_unauthenticated(&self) -> AuthResult<()> {
        if self.exchanges.load(Ordering::SeqCst) != self.started_at {
            debug!("Ignoring stale unauthenticated report from session hook");
            return Ok(());
        }
        self.store
            .mark_unauthenticated(UnauthenticatedOptions::default());
        Ok(())
    }
}

pub struct SessionBootstrapper {
    hook: Option<Arc<dyn SessionHook>>,
    store: Arc<AuthStateStore>,
    request: RestoreRequest,
    fragment: Arc<Mutex<Option<Profile>>>,
    exchanges: Arc<AtomicU64>,
}

impl SessionBootstrapper {
    pub fn new(
        hook: Option<Arc<dyn SessionHook>>,
        store: Arc<AuthStateStore>,
        request: RestoreRequest,
    ) -> Self {
        Self {
            hook,
            store,
            request,
            fragment: Arc::new(Mutex::new(None)),
            exchanges: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Remember a profile obtained by a direct credential exchange.
    pub fn record_exchange(&self, profile: &Profile) {
        *self.fragment.lock() = Some(profile.clone());
        self.exchanges.fetch_add(1, Ordering::SeqCst);
    }

    pub fn pending_fragment(&self) -> Option<Profile> {
        self.fragment.lock().clone()
    }

    pub fn clear_fragment(&self) {
        *self.fragment.lock() = None;
    }

    /// Run the host hook, or start unauthenticated when there is none.
    ///
    /// Never fails: hook errors are broadcast as `bootstrap_failed` and leave
    /// the store unauthenticated.
    pub async fn bootstrap(&self) {
        let Some(hook) = &self.hook else {
            debug!("No session hook, starting unauthenticated");
            self.store
                .mark_unauthenticated(UnauthenticatedOptions::default());
            return;
        };

        let callbacks = Arc::new(HookCallbacks {
            store: self.store.clone(),
            fragment: self.fragment.clone(),
            exchanges: self.exchanges.clone(),
            started_at: self.exchanges.load(Ordering::SeqCst),
        });

        info!(tenant_id = %self.request.tenant_id, "Restoring session through host hook");
        if let Err(e) = hook.restore(self.request.clone(), callbacks).await {
            let err = AuthError::BootstrapFailed(e.to_string());
            self.store.report_error(&err);
            self.store
                .mark_unauthenticated(UnauthenticatedOptions::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_fsm::AuthStatus;
    use crate::events::{AuthEvent, EventBroadcaster};
    use crate::host::MemoryHostElement;
    use serde_json::json;

    enum Script {
        Authenticated(Value),
        Unauthenticated,
        Fail,
    }

    struct ScriptedHook(Script);

    #[async_trait]
    impl SessionHook for ScriptedHook {
        async fn restore(
            &self,
            request: RestoreRequest,
            callbacks: Arc<dyn SessionCallbacks>,
        ) -> Result<(), HookError> {
            assert_eq!(request.tenant_id, "t1");
            match &self.0 {
                Script::Authenticated(profile) => callbacks.on_authenticated(profile.clone())?,
                Script::Unauthenticated => callbacks.on_unauthenticated()?,
                Script::Fail => return Err("session endpoint unreachable".into()),
            }
            Ok(())
        }
    }

    type Fixture = (
        SessionBootstrapper,
        Arc<AuthStateStore>,
        Arc<Mutex<Vec<AuthEvent>>>,
        crate::events::Subscription,
    );

    fn bootstrapper(hook: Option<Script>) -> Fixture {
        let host = Arc::new(MemoryHostElement::new());
        let events = Arc::new(EventBroadcaster::new(None));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = events.subscribe(move |event| sink.lock().push(event.clone()));
        let store = Arc::new(AuthStateStore::new(host, events));
        let hook = hook.map(|script| Arc::new(ScriptedHook(script)) as Arc<dyn SessionHook>);
        let request = RestoreRequest {
            base_url: "https://auth.example.test".into(),
            tenant_id: "t1".into(),
        };
        (SessionBootstrapper::new(hook, store.clone(), request), store, seen, sub)
    }

    #[tokio::test]
    async fn test_no_hook_starts_unauthenticated() {
        let (bootstrapper, store, seen, _sub) = bootstrapper(None);

        bootstrapper.bootstrap().await;
        bootstrapper.bootstrap().await;

        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        assert_eq!(*seen.lock(), vec![AuthEvent::Unauthenticated]);
    }

    #[tokio::test]
    async fn test_hook_profile_wins_over_fragment() {
        let (bootstrapper, store, _seen, _sub) = bootstrapper(Some(Script::Authenticated(
            json!({"user_id": "1", "display": "Ann B."}),
        )));
        let fragment = Profile::from_value(json!({"user_id": "1", "display": "Ann", "plan": "pro"})).unwrap();
        bootstrapper.record_exchange(&fragment);

        bootstrapper.bootstrap().await;

        let profile = store.profile().unwrap();
        assert_eq!(profile.display().as_deref(), Some("Ann B."));
        assert_eq!(profile.text("plan").as_deref(), Some("pro"));
    }

    #[tokio::test]
    async fn test_hook_failure_reports_bootstrap_failed() {
        let (bootstrapper, store, seen, _sub) = bootstrapper(Some(Script::Fail));

        bootstrapper.bootstrap().await;

        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        let seen = seen.lock();
        assert!(matches!(&seen[0], AuthEvent::Error(detail) if detail.code == "bootstrap_failed"));
        assert_eq!(seen[1], AuthEvent::Unauthenticated);
    }

    #[tokio::test]
    async fn test_invalid_hook_profile_is_rejected() {
        let (bootstrapper, store, seen, _sub) = bootstrapper(Some(Script::Authenticated(json!(["x"]))));

        bootstrapper.bootstrap().await;

        assert!(!store.is_authenticated());
        // The hook propagated invalid_profile, which surfaces as a bootstrap failure too
        let codes: Vec<String> = seen
            .lock()
            .iter()
            .filter_map(|event| match event {
                AuthEvent::Error(detail) => Some(detail.code.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec!["invalid_profile", "bootstrap_failed"]);
    }

    #[tokio::test]
    async fn test_stale_unauthenticated_ignored_after_exchange() {
        let (bootstrapper, store, _seen, _sub) = bootstrapper(None);
        let callbacks = HookCallbacks {
            store: store.clone(),
            fragment: bootstrapper.fragment.clone(),
            exchanges: bootstrapper.exchanges.clone(),
            started_at: 0,
        };

        let profile = Profile::from_value(json!({"user_id": "1"})).unwrap();
        bootstrapper.record_exchange(&profile);
        store.mark_authenticated(profile.to_value());

        callbacks.on_unauthenticated().unwrap();
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_hook_unauthenticated_without_exchange_applies() {
        let (bootstrapper, store, seen, _sub) = bootstrapper(Some(Script::Unauthenticated));

        bootstrapper.bootstrap().await;

        assert_eq!(store.status(), AuthStatus::Unauthenticated);
        assert_eq!(*seen.lock(), vec![AuthEvent::Unauthenticated]);
    }
}
