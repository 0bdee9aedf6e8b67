//! Host element abstraction.
//!
//! The controller mirrors profile fields onto the element that hosts it and
//! forwards every auth notification to it. UI layers implement
//! [`HostElement`] on top of their element type; [`MemoryHostElement`] keeps
//! everything in memory for headless hosts and tests.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Element that receives attributes and forwarded events.
pub trait HostElement: Send + Sync {
    fn set_attribute(&self, name: &str, value: &str);

    fn remove_attribute(&self, name: &str);

    /// Receives `auth:*` notifications with their detail payload.
    fn dispatch_event(&self, _name: &str, _detail: &Value) {}
}

/// A dispatched event as seen by a [`MemoryHostElement`].
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedEvent {
    pub name: String,
    pub detail: Value,
}

/// In-memory host element.
#[derive(Debug, Default)]
pub struct MemoryHostElement {
    attributes: Mutex<BTreeMap<String, String>>,
    events: Mutex<Vec<DispatchedEvent>>,
}

impl MemoryHostElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.lock().get(name).cloned()
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.attributes.lock().clone()
    }

    pub fn dispatched(&self) -> Vec<DispatchedEvent> {
        self.events.lock().clone()
    }
}

impl HostElement for MemoryHostElement {
    fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&self, name: &str) {
        self.attributes.lock().remove(name);
    }

    fn dispatch_event(&self, name: &str, detail: &Value) {
        self.events.lock().push(DispatchedEvent {
            name: name.to_string(),
            detail: detail.clone(),
        });
    }
}
