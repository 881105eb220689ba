//! Session data structure stored by the document store
//!
//! A session is an arbitrary JSON object. The `cookie` entry is kept as its
//! own field so the TTL policy can read `cookie.maxAge`; every other key is
//! flattened into `data`. Any JSON object round-trips unchanged, including a
//! missing `cookie` key and an explicit `"cookie": null`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Cookie entry of a session
///
/// Normally an object; only `maxAge` (seconds) is interpreted by the store and
/// any other keys the framework puts here are carried through untouched.
/// Whatever JSON value was stored (including `null`) is kept as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCookie {
    value: Value,
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self {
            value: Value::Object(Map::new()),
        }
    }
}

impl SessionCookie {
    /// Create an empty cookie
    pub fn new() -> Self {
        Self::default()
    }

    /// A cookie entry stored as an explicit `null`
    pub fn null() -> Self {
        Self { value: Value::Null }
    }

    /// Create a cookie with the given max age in seconds
    pub fn with_max_age(max_age_secs: u64) -> Self {
        let mut cookie = Self::new();
        cookie.set_max_age(max_age_secs);
        cookie
    }

    /// The cookie's fields, when it is an object
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.value.as_object()
    }

    /// Check if the cookie entry is an explicit `null`
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// `maxAge` in seconds, if present and numeric
    pub fn max_age(&self) -> Option<f64> {
        self.value.get("maxAge").and_then(Value::as_f64)
    }

    /// Set `maxAge` in seconds, turning a non-object cookie into an object
    pub fn set_max_age(&mut self, max_age_secs: u64) {
        if !self.value.is_object() {
            self.value = Value::Object(Map::new());
        }
        if let Value::Object(fields) = &mut self.value {
            fields.insert("maxAge".to_string(), Value::from(max_age_secs));
        }
    }
}

/// Keep a present `cookie` key as `Some`, even when its value is `null`
fn present_cookie<'de, D>(deserializer: D) -> Result<Option<SessionCookie>, D::Error>
where
    D: Deserializer<'de>,
{
    SessionCookie::deserialize(deserializer).map(Some)
}

/// Session payload as handed to the store by the framework
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Cookie entry, None for sessions that never carried the key
    #[serde(
        default,
        deserialize_with = "present_cookie",
        skip_serializing_if = "Option::is_none"
    )]
    pub cookie: Option<SessionCookie>,

    /// Additional session data (flattened at same level as cookie)
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl SessionData {
    /// Create an empty session with an empty cookie
    pub fn new() -> Self {
        Self {
            cookie: Some(SessionCookie::new()),
            data: Map::new(),
        }
    }

    /// Create a session whose cookie carries the given max age in seconds
    pub fn with_max_age(max_age_secs: u64) -> Self {
        Self {
            cookie: Some(SessionCookie::with_max_age(max_age_secs)),
            data: Map::new(),
        }
    }

    /// Parse a session from its stored JSON encoding
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the session to the JSON string that gets stored
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// `cookie.maxAge` in seconds, if the session has a numeric one
    pub fn max_age(&self) -> Option<f64> {
        self.cookie.as_ref().and_then(SessionCookie::max_age)
    }

    /// Get a value from session data
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in session data
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.to_string(), v);
        }
    }

    /// Remove a value from session data
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Check if a key exists
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Clear all session data (except cookie)
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Check if session data is empty (no user data)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
