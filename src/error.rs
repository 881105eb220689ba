//! Session error types

use thiserror::Error;

/// Errors that can occur during session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// Error from the underlying collection
    #[error("Session store error: {0}")]
    Store(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored document could not be turned back into a session
    #[error("Corrupt session document '{id}': {reason}")]
    Corrupt { id: String, reason: String },

    /// No Tokio runtime available to host the reaper
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Redis error (when redis-store feature is enabled)
    #[cfg(feature = "redis-store")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl SessionError {
    pub(crate) fn corrupt(id: &str, reason: impl Into<String>) -> Self {
        SessionError::Corrupt {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
