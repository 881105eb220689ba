//! In-memory document collection
//!
//! This is primarily for development and testing.
//! For production, use RedisCollection or another persistent backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Collection, Database};
use crate::document::{DeleteResult, Document, Filter, UpdateOptions, WriteResult, ID_FIELD};
use crate::error::SessionError;

/// In-memory document collection keyed by `_id`
///
/// Warning: This collection is not suitable for production use because:
/// - Documents are lost on server restart
/// - Documents are not shared across multiple server instances
#[derive(Clone, Default)]
pub struct MemoryCollection {
    docs: Arc<RwLock<HashMap<String, Document>>>,
}

impl MemoryCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the raw document stored under `sid`
    pub fn document(&self, sid: &str) -> Option<Document> {
        self.docs.read().get(sid).cloned()
    }

    /// Insert or replace a raw document, bypassing update semantics
    ///
    /// Returns false when the document has no string `_id`.
    pub fn insert_raw(&self, doc: Document) -> bool {
        match doc.get(ID_FIELD).and_then(Value::as_str) {
            Some(sid) => {
                let sid = sid.to_string();
                self.docs.write().insert(sid, doc);
                true
            }
            None => false,
        }
    }
}

/// Apply `$set` fields to a document, reporting whether anything changed
fn apply_set(doc: &mut Document, set: &Document) -> bool {
    let mut changed = false;
    for (field, value) in set {
        if field == ID_FIELD {
            continue;
        }
        if doc.get(field) != Some(value) {
            doc.insert(field.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, SessionError> {
        let docs = self.docs.read();
        let found = match filter {
            Filter::Id(sid) => docs.get(sid).cloned(),
            _ => docs.values().find(|doc| filter.matches(doc)).cloned(),
        };
        Ok(found)
    }

    async fn update(
        &self,
        filter: &Filter,
        set: Document,
        options: UpdateOptions,
    ) -> Result<WriteResult, SessionError> {
        let mut docs = self.docs.write();
        let mut result = WriteResult::default();

        let mut record = |doc: &mut Document| {
            result.matched += 1;
            if apply_set(doc, &set) {
                result.modified += 1;
            }
        };
        match filter {
            Filter::Id(sid) => {
                if let Some(doc) = docs.get_mut(sid) {
                    record(doc);
                }
            }
            _ => docs
                .values_mut()
                .filter(|doc| filter.matches(doc))
                .for_each(|doc| record(doc)),
        }

        if result.matched == 0 && options.upsert {
            let Filter::Id(sid) = filter else {
                return Err(SessionError::Store(format!(
                    "upsert requires an _id filter, got {:?}",
                    filter
                )));
            };
            let mut doc = Document::new();
            doc.insert(ID_FIELD.to_string(), Value::String(sid.clone()));
            apply_set(&mut doc, &set);
            docs.insert(sid.clone(), doc);
            result.upserted = true;
        }

        Ok(result)
    }

    async fn remove(&self, filter: &Filter) -> Result<DeleteResult, SessionError> {
        let mut docs = self.docs.write();
        let before = docs.len();
        match filter {
            Filter::Id(sid) => {
                docs.remove(sid);
            }
            _ => docs.retain(|_, doc| !filter.matches(doc)),
        }
        Ok(DeleteResult {
            deleted: (before - docs.len()) as u64,
        })
    }

    async fn count(&self, filter: &Filter) -> Result<u64, SessionError> {
        let docs = self.docs.read();
        let count = match filter {
            Filter::All => docs.len(),
            _ => docs.values().filter(|doc| filter.matches(doc)).count(),
        };
        Ok(count as u64)
    }

    async fn drop_collection(&self) -> Result<(), SessionError> {
        self.docs.write().clear();
        Ok(())
    }
}

/// In-memory database handing out named [`MemoryCollection`]s
///
/// Resolving the same name twice yields the same underlying collection.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    collections: Arc<RwLock<HashMap<String, MemoryCollection>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed access to a collection, creating it if needed
    pub fn memory_collection(&self, name: &str) -> MemoryCollection {
        self.collections
            .write()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Names of the collections opened so far
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, SessionError> {
        Ok(Arc::new(self.memory_collection(name)))
    }
}
