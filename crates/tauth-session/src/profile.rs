//! Session profile returned by the session service or the restore hook.

use crate::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile fields mirrored onto host-element attributes.
pub const PROFILE_ATTRIBUTES: [(&str, &str); 4] = [
    ("user_id", "data-user-id"),
    ("user_email", "data-user-email"),
    ("display", "data-user-display"),
    ("avatar_url", "data-user-avatar-url"),
];

/// Opaque key/value profile. Unrecognized fields are carried untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(Map<String, Value>);

impl Profile {
    /// Accept any JSON object; reject everything else as `invalid_profile`.
    pub fn from_value(value: Value) -> AuthResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(AuthError::InvalidProfile("profile is null".to_string())),
            other => Err(AuthError::InvalidProfile(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Field rendered as attribute text. Strings pass through, numbers and
    /// booleans are stringified, anything else is absent.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<String> {
        self.text("user_id")
    }

    pub fn display(&self) -> Option<String> {
        self.text("display")
    }

    /// `overrides` wins on every conflicting key.
    pub fn merged_with(&self, overrides: &Profile) -> Profile {
        let mut merged = self.0.clone();
        for (key, value) in &overrides.0 {
            merged.insert(key.clone(), value.clone());
        }
        Profile(merged)
    }

    /// Key-order independent serialization used to detect identical profiles.
    ///
    /// `Map` is ordered by key, so nested objects serialize sorted as well.
    pub fn canonical_key(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
