//! Storage layer traits

use async_trait::async_trait;
use std::sync::Arc;

use crate::document::{DeleteResult, Document, Filter, UpdateOptions, WriteResult};
use crate::error::SessionError;

/// A document collection, the storage capability a session store sits on
///
/// This mirrors the handful of calls a document database driver offers.
/// Implementations are responsible for their own durability, pooling and
/// concurrent-client safety.
#[async_trait]
pub trait Collection: Send + Sync + 'static {
    /// Fetch the first document matching `filter`
    ///
    /// Returns None if nothing matches
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, SessionError>;

    /// Apply `set` to the documents matching `filter`
    ///
    /// Each top-level field in `set` replaces the field of the same name,
    /// other fields are kept. With `options.upsert` a missing document is
    /// created from the filter's `_id` plus `set`.
    async fn update(
        &self,
        filter: &Filter,
        set: Document,
        options: UpdateOptions,
    ) -> Result<WriteResult, SessionError>;

    /// Remove every document matching `filter`
    async fn remove(&self, filter: &Filter) -> Result<DeleteResult, SessionError>;

    /// Count documents matching `filter`
    async fn count(&self, filter: &Filter) -> Result<u64, SessionError>;

    /// Drop the whole collection
    async fn drop_collection(&self) -> Result<(), SessionError>;
}

/// A database handle that can open collections by name
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Resolve (opening or creating as needed) the named collection
    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, SessionError>;
}
