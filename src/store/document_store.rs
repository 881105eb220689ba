//! Session store over a document collection
//!
//! Each session is one document:
//! `{ _id: <sid>, session: <json string>, expires: <epoch ms>, ...hook fields }`.
//! Writes are `$set` upserts keyed by `_id`; an optional reaper removes
//! documents whose `expires` has passed.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::SessionStore;
use crate::collection::{Collection, Database};
use crate::config::{StoreOptions, DEFAULT_TTL_MS};
use crate::document::{
    epoch_millis, DeleteResult, Document, Filter, UpdateOptions, WriteResult, EXPIRES_FIELD,
    ID_FIELD, SESSION_FIELD,
};
use crate::error::SessionError;
use crate::reaper::{Reaper, ReapingStatus};
use crate::session::SessionData;

/// Hook run on every `set` before the session is serialized
///
/// It may mutate the session in place (the mutation is what gets stored) and
/// may return extra top-level fields to merge into the document, e.g. a user
/// id that external queries can filter on.
pub type ModifyFn = Arc<dyn Fn(&mut SessionData) -> Option<Document> + Send + Sync>;

/// Wrap a closure as a [`ModifyFn`]
pub fn modify_fn<F>(f: F) -> ModifyFn
where
    F: Fn(&mut SessionData) -> Option<Document> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Inner {
    collection: Arc<dyn Collection>,
    options: StoreOptions,
    modify: Option<ModifyFn>,
    reaper: Option<Reaper>,
}

/// Session store over a document [`Collection`]
///
/// Cloning is cheap and clones share the collection, configuration and
/// reaper. The reaper is aborted when the last clone is dropped; call
/// [`DocumentStore::shutdown`] to stop it gracefully.
///
/// # Example
///
/// ```rust,ignore
/// use docstore_session::{DocumentStore, MemoryDatabase, StoreOptions, modify_fn};
///
/// let db = MemoryDatabase::new();
/// let options = StoreOptions::new().with_reap_interval_ms(60_000);
/// let hook = modify_fn(|session| {
///     let user = session.get::<String>("user")?;
///     let mut extra = serde_json::Map::new();
///     extra.insert("user_id".into(), user.into());
///     Some(extra)
/// });
/// let store = DocumentStore::connect(&db, options, Some(hook)).await?;
/// ```
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

impl DocumentStore {
    /// Create a store on an already resolved collection
    ///
    /// Starts the reaper when the options ask for one, which requires a
    /// running Tokio runtime.
    pub fn with_collection(
        collection: Arc<dyn Collection>,
        options: StoreOptions,
        modify: Option<ModifyFn>,
    ) -> Result<Self, SessionError> {
        let reaper = match options.reap_interval() {
            Some(interval) => Some(Reaper::start(
                Arc::clone(&collection),
                interval,
                options.log_reaping,
            )?),
            None => {
                tracing::info!("Reaping sessions disabled");
                None
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                collection,
                options,
                modify,
                reaper,
            }),
        })
    }

    /// Create a store on the collection named by `options.collection_name`
    pub async fn connect<D>(
        db: &D,
        options: StoreOptions,
        modify: Option<ModifyFn>,
    ) -> Result<Self, SessionError>
    where
        D: Database + ?Sized,
    {
        let collection = db.collection(&options.collection_name).await?;
        Self::with_collection(collection, options, modify)
    }

    /// The options this store was built with
    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    /// The underlying collection
    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.inner.collection
    }

    /// Whether expired sessions are being reaped
    pub fn reaping_status(&self) -> ReapingStatus {
        match &self.inner.reaper {
            Some(reaper) => reaper.status(),
            None => ReapingStatus::Disabled,
        }
    }

    /// Stop reaping, waiting for an in-flight reap to complete
    pub async fn shutdown(&self) {
        if let Some(reaper) = &self.inner.reaper {
            reaper.shutdown().await;
        }
    }

    /// TTL in milliseconds for a session
    ///
    /// Fixed TTL if configured, else `cookie.maxAge` seconds, else one day.
    /// Huge `maxAge` values clamp to the `i64` range.
    pub fn ttl_ms(&self, session: &SessionData) -> i64 {
        if let Some(ttl) = self.inner.options.fixed_ttl_ms() {
            return ttl;
        }
        match session.max_age() {
            Some(max_age_secs) => {
                let ttl = (max_age_secs * 1000.0).clamp(i64::MIN as f64, i64::MAX as f64);
                ttl as i64
            }
            None => DEFAULT_TTL_MS,
        }
    }

    /// Absolute expiry for a session written now, saturating instead of overflowing
    fn expires_at(&self, session: &SessionData) -> i64 {
        epoch_millis().saturating_add(self.ttl_ms(session))
    }

    /// Build the `$set` document for a write
    fn build_update(&self, session: &SessionData) -> Result<Document, SessionError> {
        let mut session = session.clone();
        let mut update = Document::new();

        if let Some(modify) = &self.inner.modify {
            if let Some(extra) = modify(&mut session) {
                update.extend(extra.into_iter().filter(|(field, _)| field != ID_FIELD));
            }
        }

        // Reserved fields are written last so they win over hook output
        update.insert(
            SESSION_FIELD.to_string(),
            Value::String(session.to_json()?),
        );
        let expires = self.expires_at(&session);
        update.insert(EXPIRES_FIELD.to_string(), Value::from(expires));

        Ok(update)
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("options", &self.inner.options)
            .field("modify", &self.inner.modify.is_some())
            .field("reaping", &self.reaping_status())
            .finish()
    }
}

#[async_trait]
impl SessionStore for DocumentStore {
    async fn get(&self, sid: &str) -> Result<Option<SessionData>, SessionError> {
        let doc = match self.inner.collection.find_one(&Filter::id(sid)).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!(sid, error = %e, "Failed to load session");
                return Err(e);
            }
        };

        let raw = doc
            .get(SESSION_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| SessionError::corrupt(sid, "missing string 'session' field"))?;
        let session =
            SessionData::from_json(raw).map_err(|e| SessionError::corrupt(sid, e.to_string()))?;

        Ok(Some(session))
    }

    async fn set(&self, sid: &str, session: &SessionData) -> Result<WriteResult, SessionError> {
        let update = self.build_update(session)?;

        self.inner
            .collection
            .update(&Filter::id(sid), update, UpdateOptions::upsert())
            .await
            .inspect_err(|e| debug!(sid, error = %e, "Failed to save session"))
    }

    async fn destroy(&self, sid: &str) -> Result<DeleteResult, SessionError> {
        self.inner
            .collection
            .remove(&Filter::id(sid))
            .await
            .inspect_err(|e| debug!(sid, error = %e, "Failed to destroy session"))
    }

    async fn touch(&self, sid: &str, session: &SessionData) -> Result<WriteResult, SessionError> {
        let mut update = Document::new();
        let expires = self.expires_at(session);
        update.insert(EXPIRES_FIELD.to_string(), Value::from(expires));

        self.inner
            .collection
            .update(&Filter::id(sid), update, UpdateOptions::default())
            .await
            .inspect_err(|e| debug!(sid, error = %e, "Failed to touch session"))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.inner.collection.drop_collection().await
    }

    async fn length(&self) -> Result<u64, SessionError> {
        self.inner.collection.count(&Filter::All).await
    }
}
