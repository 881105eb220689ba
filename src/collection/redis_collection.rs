//! Redis-backed document collection
//!
//! Layout for a collection named `sessions`:
//! - `sessions:doc:<id>`: hash, one field per top-level document field,
//!   each value holding the JSON encoding of that field
//! - `sessions:ids`: set of every stored `_id`
//! - `sessions:expires`: sorted set of `_id`s scored by their `expires` field
//!
//! The two indexes let reaping and counting run without scanning keys.
//! Every check-then-write (upsert, update of an existing document, removal
//! of expired documents) runs as a Lua script so it is atomic per document.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Collection, Database};
use crate::document::{
    DeleteResult, Document, Filter, UpdateOptions, WriteResult, EXPIRES_FIELD, ID_FIELD,
};
use crate::error::SessionError;

/// Apply a `$set` to one document.
///
/// KEYS: document hash, id set, expiry index.
/// ARGV: id, upsert flag, expiry mode (`set`/`clear`/`keep`), expiry score,
/// then field/value pairs.
/// Returns -1 when nothing matched, 0 when inserted, 1 when updated.
const WRITE_SCRIPT: &str = r#"
local exists = redis.call('EXISTS', KEYS[1])
if exists == 0 and ARGV[2] ~= '1' then
  return -1
end
if #ARGV > 4 then
  redis.call('HSET', KEYS[1], unpack(ARGV, 5))
end
redis.call('SADD', KEYS[2], ARGV[1])
if ARGV[3] == 'set' then
  redis.call('ZADD', KEYS[3], ARGV[4], ARGV[1])
elseif ARGV[3] == 'clear' then
  redis.call('ZREM', KEYS[3], ARGV[1])
end
return exists
"#;

/// Remove every document, or those whose expiry is at or before a score.
///
/// KEYS: id set, expiry index.
/// ARGV: document key prefix, mode (`all`/`expired`), expiry score.
/// Returns the number of document hashes deleted.
const REMOVE_SCRIPT: &str = r#"
local ids
if ARGV[2] == 'expired' then
  ids = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[3])
else
  ids = redis.call('SMEMBERS', KEYS[1])
end
local deleted = 0
for _, id in ipairs(ids) do
  deleted = deleted + redis.call('DEL', ARGV[1] .. id)
  redis.call('ZREM', KEYS[2], id)
  redis.call('SREM', KEYS[1], id)
end
return deleted
"#;

struct Scripts {
    write: Script,
    remove: Script,
}

impl Scripts {
    fn new() -> Self {
        Self {
            write: Script::new(WRITE_SCRIPT),
            remove: Script::new(REMOVE_SCRIPT),
        }
    }
}

/// Outcome of [`WRITE_SCRIPT`] for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    Missing,
    Inserted,
    Updated,
}

/// Redis document collection
///
/// # Example
///
/// ```rust,ignore
/// use docstore_session::collection::RedisDatabase;
///
/// let db = RedisDatabase::from_url("redis://127.0.0.1/").await?;
/// let store = DocumentStore::connect(&db, StoreOptions::default(), None).await?;
/// ```
pub struct RedisCollection {
    conn: Arc<ConnectionManager>,
    name: String,
    scripts: Arc<Scripts>,
}

impl RedisCollection {
    /// Open the collection `name` on an existing connection manager
    pub fn new<S: Into<String>>(conn: ConnectionManager, name: S) -> Self {
        Self {
            conn: Arc::new(conn),
            name: name.into(),
            scripts: Arc::new(Scripts::new()),
        }
    }

    /// Collection name, also the key prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    fn doc_key(&self, sid: &str) -> String {
        format!("{}:doc:{}", self.name, sid)
    }

    fn ids_key(&self) -> String {
        format!("{}:ids", self.name)
    }

    fn expires_key(&self) -> String {
        format!("{}:expires", self.name)
    }

    /// Ids of the documents a filter selects
    async fn matching_ids(&self, filter: &Filter) -> Result<Vec<String>, SessionError> {
        let mut conn = (*self.conn).clone();
        let ids = match filter {
            Filter::Id(sid) => {
                let exists: bool = conn.exists(self.doc_key(sid)).await?;
                if exists {
                    vec![sid.clone()]
                } else {
                    vec![]
                }
            }
            Filter::All => {
                let ids: Vec<String> = conn.smembers(self.ids_key()).await?;
                ids
            }
            Filter::ExpiresAtOrBefore(at) => {
                let ids: Vec<String> = conn.zrangebyscore(self.expires_key(), "-inf", *at).await?;
                ids
            }
        };
        Ok(ids)
    }

    async fn load(&self, sid: &str) -> Result<Option<Document>, SessionError> {
        let mut conn = (*self.conn).clone();
        let fields: HashMap<String, String> = conn.hgetall(self.doc_key(sid)).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let mut doc = Document::new();
        doc.insert(ID_FIELD.to_string(), Value::String(sid.to_string()));
        for (field, raw) in fields {
            let value: Value = serde_json::from_str(&raw)
                .map_err(|e| SessionError::corrupt(sid, format!("field '{}': {}", field, e)))?;
            doc.insert(field, value);
        }
        Ok(Some(doc))
    }

    /// Atomically write `set` into the document `sid`
    ///
    /// Without `upsert`, a document that is gone by the time the script runs
    /// is left gone.
    async fn write_document(
        &self,
        sid: &str,
        set: &Document,
        upsert: bool,
    ) -> Result<WriteOutcome, SessionError> {
        let mut invocation = self.scripts.write.prepare_invoke();
        invocation
            .key(self.doc_key(sid))
            .key(self.ids_key())
            .key(self.expires_key())
            .arg(sid)
            .arg(if upsert { "1" } else { "0" });

        match set.get(EXPIRES_FIELD) {
            Some(value) => match value.as_i64() {
                Some(expires) => invocation.arg("set").arg(expires),
                None => invocation.arg("clear").arg(0),
            },
            None => invocation.arg("keep").arg(0),
        };

        for (field, value) in set {
            if field == ID_FIELD {
                continue;
            }
            invocation
                .arg(field.as_str())
                .arg(serde_json::to_string(value)?);
        }

        let mut conn = (*self.conn).clone();
        let outcome: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(match outcome {
            0 => WriteOutcome::Inserted,
            n if n > 0 => WriteOutcome::Updated,
            _ => WriteOutcome::Missing,
        })
    }

    /// Atomically remove all documents, or the expired ones
    async fn remove_by_script(&self, mode: &str, at: i64) -> Result<u64, SessionError> {
        let mut invocation = self.scripts.remove.prepare_invoke();
        invocation
            .key(self.ids_key())
            .key(self.expires_key())
            .arg(format!("{}:doc:", self.name))
            .arg(mode)
            .arg(at);

        let mut conn = (*self.conn).clone();
        let deleted: u64 = invocation.invoke_async(&mut conn).await?;
        Ok(deleted)
    }
}

impl Clone for RedisCollection {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            name: self.name.clone(),
            scripts: Arc::clone(&self.scripts),
        }
    }
}

#[async_trait]
impl Collection for RedisCollection {
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, SessionError> {
        let sid = match filter {
            Filter::Id(sid) => Some(sid.clone()),
            Filter::All => {
                let mut conn = (*self.conn).clone();
                let sid: Option<String> = conn.srandmember(self.ids_key()).await?;
                sid
            }
            Filter::ExpiresAtOrBefore(at) => {
                let mut conn = (*self.conn).clone();
                let ids: Vec<String> = conn
                    .zrangebyscore_limit(self.expires_key(), "-inf", *at, 0, 1)
                    .await?;
                ids.into_iter().next()
            }
        };

        match sid {
            Some(sid) => self.load(&sid).await,
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        filter: &Filter,
        set: Document,
        options: UpdateOptions,
    ) -> Result<WriteResult, SessionError> {
        if let Filter::Id(sid) = filter {
            let outcome = self.write_document(sid, &set, options.upsert).await?;
            let matched = u64::from(outcome == WriteOutcome::Updated);
            return Ok(WriteResult {
                matched,
                modified: matched,
                upserted: outcome == WriteOutcome::Inserted,
            });
        }

        let ids = self.matching_ids(filter).await?;
        if ids.is_empty() && options.upsert {
            return Err(SessionError::Store(format!(
                "upsert requires an _id filter, got {:?}",
                filter
            )));
        }

        let mut result = WriteResult::default();
        for sid in &ids {
            if self.write_document(sid, &set, false).await? == WriteOutcome::Updated {
                result.matched += 1;
                result.modified += 1;
            }
        }
        Ok(result)
    }

    async fn remove(&self, filter: &Filter) -> Result<DeleteResult, SessionError> {
        let deleted = match filter {
            Filter::Id(sid) => {
                let mut pipe = redis::pipe();
                pipe.atomic()
                    .del(self.doc_key(sid))
                    .zrem(self.expires_key(), sid)
                    .ignore()
                    .srem(self.ids_key(), sid)
                    .ignore();

                let mut conn = (*self.conn).clone();
                let (deleted,): (u64,) = pipe.query_async(&mut conn).await?;
                deleted
            }
            Filter::All => self.remove_by_script("all", 0).await?,
            Filter::ExpiresAtOrBefore(at) => self.remove_by_script("expired", *at).await?,
        };
        Ok(DeleteResult { deleted })
    }

    async fn count(&self, filter: &Filter) -> Result<u64, SessionError> {
        let mut conn = (*self.conn).clone();
        let count: u64 = match filter {
            Filter::All => conn.scard(self.ids_key()).await?,
            Filter::Id(sid) => {
                let exists: bool = conn.exists(self.doc_key(sid)).await?;
                u64::from(exists)
            }
            Filter::ExpiresAtOrBefore(at) => {
                conn.zcount(self.expires_key(), "-inf", *at).await?
            }
        };
        Ok(count)
    }

    async fn drop_collection(&self) -> Result<(), SessionError> {
        let mut conn = (*self.conn).clone();
        let ids: Vec<String> = conn.smembers(self.ids_key()).await?;

        let mut keys: Vec<String> = ids.iter().map(|sid| self.doc_key(sid)).collect();
        keys.push(self.ids_key());
        keys.push(self.expires_key());

        conn.del::<_, ()>(keys).await?;
        Ok(())
    }
}

/// Redis database handing out [`RedisCollection`]s on a shared connection
pub struct RedisDatabase {
    conn: ConnectionManager,
}

impl RedisDatabase {
    /// Create a new Redis database handle from a client
    pub async fn new(client: redis::Client) -> Result<Self, SessionError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Create a new Redis database handle from a connection string
    pub async fn from_url(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url).map_err(|e| {
            SessionError::Store(format!("Failed to create Redis client: {}", e))
        })?;
        Self::new(client).await
    }

    /// Create a new Redis database handle from an existing connection manager
    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Database for RedisDatabase {
    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, SessionError> {
        Ok(Arc::new(RedisCollection::new(self.conn.clone(), name)))
    }
}
