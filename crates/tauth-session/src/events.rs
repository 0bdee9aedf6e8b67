//! Auth notifications and their fan-out.
//!
//! Listeners registered with [`EventBroadcaster::subscribe`] run
//! synchronously, in registration order, on the task that changed the state.
//! Async consumers use [`EventBroadcaster::channel`] instead. Every event is
//! also forwarded to the host element.

use crate::host::HostElement;
use crate::profile::Profile;
use crate::AuthError;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::debug;

pub const AUTHENTICATED_EVENT: &str = "auth:authenticated";
pub const UNAUTHENTICATED_EVENT: &str = "auth:unauthenticated";
pub const ERROR_EVENT: &str = "auth:error";

const CHANNEL_CAPACITY: usize = 64;

/// Payload of an `auth:error` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthErrorDetail {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&AuthError> for AuthErrorDetail {
    fn from(err: &AuthError) -> Self {
        Self {
            code: err.code().to_string(),
            message: Some(err.to_string()),
            status: err.status(),
        }
    }
}

/// A state-change or error notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    Authenticated { profile: Profile },
    Unauthenticated,
    Error(AuthErrorDetail),
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::Authenticated { .. } => AUTHENTICATED_EVENT,
            AuthEvent::Unauthenticated => UNAUTHENTICATED_EVENT,
            AuthEvent::Error(_) => ERROR_EVENT,
        }
    }

    /// Detail object forwarded with the event.
    pub fn detail(&self) -> Value {
        match self {
            AuthEvent::Authenticated { profile } => json!({ "profile": profile }),
            AuthEvent::Unauthenticated => json!({ "profile": null }),
            AuthEvent::Error(detail) => json!(detail),
        }
    }
}

/// Synchronous listener callback.
pub type AuthListener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(u64, AuthListener)>,
}

/// Handle returned by [`EventBroadcaster::subscribe`].
///
/// Dropping it removes the listener.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Fans out auth events to listeners, channel receivers and the host element.
pub struct EventBroadcaster {
    registry: Arc<Mutex<ListenerRegistry>>,
    channel: broadcast::Sender<AuthEvent>,
    host: Option<Arc<dyn HostElement>>,
}

impl EventBroadcaster {
    pub fn new(host: Option<Arc<dyn HostElement>>) -> Self {
        let (channel, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            registry: Arc::new(Mutex::new(ListenerRegistry::default())),
            channel,
            host,
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Receiver for async consumers. Only sees events emitted after this call.
    pub fn channel(&self) -> broadcast::Receiver<AuthEvent> {
        self.channel.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    pub fn emit(&self, event: AuthEvent) {
        let listeners: Vec<AuthListener> = self
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        debug!(event = event.name(), listeners = listeners.len(), "Broadcasting auth event");

        for listener in &listeners {
            listener(&event);
        }
        if let Some(host) = &self.host {
            host.dispatch_event(event.name(), &event.detail());
        }
        // No receivers is fine.
        let _ = self.channel.send(event);
    }
}
