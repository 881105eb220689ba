//! Session store trait

use async_trait::async_trait;

use crate::document::{DeleteResult, WriteResult};
use crate::error::SessionError;
use crate::session::SessionData;

/// Trait for session storage backends
///
/// This is the capability set a session middleware expects from its store.
/// A missing session is `Ok(None)`, never an error; callers that do not care
/// about the outcome of a write can discard the returned `Result`.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Get a session by ID
    ///
    /// Returns None if session doesn't exist
    async fn get(&self, sid: &str) -> Result<Option<SessionData>, SessionError>;

    /// Set/update a session
    ///
    /// The expiry is derived by the store, see its TTL policy
    async fn set(&self, sid: &str, session: &SessionData) -> Result<WriteResult, SessionError>;

    /// Destroy/delete a session
    ///
    /// Destroying a session that does not exist is not an error
    async fn destroy(&self, sid: &str) -> Result<DeleteResult, SessionError>;

    /// Touch a session - push back its expiry without modifying data
    ///
    /// This is called when the session is accessed but not modified
    async fn touch(&self, sid: &str, session: &SessionData) -> Result<WriteResult, SessionError>;

    /// Clear all sessions (optional)
    async fn clear(&self) -> Result<(), SessionError> {
        Err(SessionError::Store("clear not implemented".to_string()))
    }

    /// Get the count of all sessions (optional)
    async fn length(&self) -> Result<u64, SessionError> {
        Err(SessionError::Store("length not implemented".to_string()))
    }
}
