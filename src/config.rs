//! Store configuration

use serde::Deserialize;
use std::time::Duration;

/// Collection used when none is named
pub const DEFAULT_COLLECTION_NAME: &str = "sessions";

/// Reap intervals below this many milliseconds disable reaping
pub const MIN_REAP_INTERVAL_MS: u64 = 500;

/// TTL applied when neither a fixed TTL nor `cookie.maxAge` is available (one day)
pub const DEFAULT_TTL_MS: i64 = 86_400_000;

/// Construction-time options for [`DocumentStore`](crate::DocumentStore)
///
/// Deserializes from the same camelCase keys a JavaScript session store
/// would accept (`ttl`, `reapIntervalMs`, `collectionName`, `logReaping`),
/// so it can be read straight out of an application's config file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreOptions {
    /// Fixed TTL in milliseconds, overriding the cookie's maxAge (default: None)
    #[serde(rename = "ttl")]
    pub ttl_ms: Option<u64>,

    /// How often to remove expired sessions, in milliseconds (default: None = never)
    ///
    /// Values below [`MIN_REAP_INTERVAL_MS`] disable reaping.
    pub reap_interval_ms: Option<u64>,

    /// Collection to resolve when no handle is injected (default: "sessions")
    pub collection_name: String,

    /// Log every successful reap cycle (default: false)
    pub log_reaping: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            ttl_ms: None,
            reap_interval_ms: None,
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            log_reaping: false,
        }
    }
}

impl StoreOptions {
    /// Create options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed TTL in milliseconds
    pub fn with_ttl_ms(mut self, ttl_ms: impl Into<Option<u64>>) -> Self {
        self.ttl_ms = ttl_ms.into();
        self
    }

    /// Set a fixed TTL from Duration
    pub fn with_ttl(mut self, ttl: impl Into<Option<Duration>>) -> Self {
        self.ttl_ms = ttl.into().map(duration_millis);
        self
    }

    /// Set the reap interval in milliseconds
    pub fn with_reap_interval_ms(mut self, interval_ms: impl Into<Option<u64>>) -> Self {
        self.reap_interval_ms = interval_ms.into();
        self
    }

    /// Set the reap interval from Duration
    pub fn with_reap_interval(mut self, interval: impl Into<Option<Duration>>) -> Self {
        self.reap_interval_ms = interval.into().map(duration_millis);
        self
    }

    /// Set the collection name (default: "sessions")
    pub fn with_collection_name<S: Into<String>>(mut self, name: S) -> Self {
        self.collection_name = name.into();
        self
    }

    /// Set whether each reap cycle is logged (default: false)
    pub fn with_log_reaping(mut self, log_reaping: bool) -> Self {
        self.log_reaping = log_reaping;
        self
    }

    /// The fixed TTL, if one is in effect
    ///
    /// A TTL of zero counts as unset; values past `i64::MAX` clamp to it.
    pub fn fixed_ttl_ms(&self) -> Option<i64> {
        self.ttl_ms
            .filter(|ttl| *ttl > 0)
            .map(|ttl| i64::try_from(ttl).unwrap_or(i64::MAX))
    }

    /// The reap interval, if it is set and not below the floor
    pub fn reap_interval(&self) -> Option<Duration> {
        self.reap_interval_ms
            .filter(|ms| *ms >= MIN_REAP_INTERVAL_MS)
            .map(Duration::from_millis)
    }
}

/// Whole milliseconds in a Duration, saturating at `u64::MAX`
fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = StoreOptions::default();
        assert_eq!(options.collection_name, "sessions");
        assert_eq!(options.fixed_ttl_ms(), None);
        assert_eq!(options.reap_interval(), None);
        assert!(!options.log_reaping);
    }

    #[test]
    fn test_reap_interval_floor() {
        let below = StoreOptions::new().with_reap_interval_ms(499);
        assert_eq!(below.reap_interval(), None);

        let at = StoreOptions::new().with_reap_interval_ms(500);
        assert_eq!(at.reap_interval(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_ttl_is_unset() {
        let options = StoreOptions::new().with_ttl_ms(0);
        assert_eq!(options.fixed_ttl_ms(), None);

        let options = StoreOptions::new().with_ttl(Duration::from_secs(2));
        assert_eq!(options.fixed_ttl_ms(), Some(2000));
    }

    #[test]
    fn test_oversized_values_clamp() {
        let options = StoreOptions::new().with_ttl_ms(u64::MAX);
        assert_eq!(options.fixed_ttl_ms(), Some(i64::MAX));

        let options = StoreOptions::new().with_ttl_ms(i64::MAX as u64 + 1);
        assert_eq!(options.fixed_ttl_ms(), Some(i64::MAX));

        let options = StoreOptions::new()
            .with_ttl(Duration::MAX)
            .with_reap_interval(Duration::MAX);
        assert_eq!(options.ttl_ms, Some(u64::MAX));
        assert_eq!(options.reap_interval_ms, Some(u64::MAX));
        assert_eq!(options.fixed_ttl_ms(), Some(i64::MAX));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options: StoreOptions = serde_json::from_str(
            r#"{"ttl":150,"reapIntervalMs":500,"collectionName":"sessions_test","logReaping":true}"#,
        )
        .unwrap();

        assert_eq!(options.ttl_ms, Some(150));
        assert_eq!(options.reap_interval_ms, Some(500));
        assert_eq!(options.collection_name, "sessions_test");
        assert!(options.log_reaping);

        let partial: StoreOptions = serde_json::from_str(r#"{"ttl":1000}"#).unwrap();
        assert_eq!(partial.collection_name, DEFAULT_COLLECTION_NAME);
    }
}
