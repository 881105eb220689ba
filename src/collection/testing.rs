//! Recording collection for interaction tests

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Collection, MemoryCollection};
use crate::document::{DeleteResult, Document, Filter, UpdateOptions, WriteResult};
use crate::error::SessionError;

/// One call made against a [`RecordingCollection`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    FindOne(Filter),
    Update(Filter, Document, UpdateOptions),
    Remove(Filter),
    Count(Filter),
    Drop,
}

/// Collection that logs every call and either delegates to a
/// [`MemoryCollection`] or fails each call with `SOME_ERROR`
pub(crate) struct RecordingCollection {
    inner: MemoryCollection,
    calls: Mutex<Vec<Call>>,
    fail: bool,
}

impl RecordingCollection {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryCollection::new(),
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn memory(&self) -> &MemoryCollection {
        &self.inner
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// The `$set` document of the most recent update
    pub(crate) fn last_update(&self) -> Option<(Filter, Document, UpdateOptions)> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            Call::Update(filter, set, options) => Some((filter.clone(), set.clone(), *options)),
            _ => None,
        })
    }

    fn record(&self, call: Call) -> Result<(), SessionError> {
        self.calls.lock().push(call);
        if self.fail {
            Err(SessionError::Store("SOME_ERROR".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Collection for RecordingCollection {
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, SessionError> {
        self.record(Call::FindOne(filter.clone()))?;
        self.inner.find_one(filter).await
    }

    async fn update(
        &self,
        filter: &Filter,
        set: Document,
        options: UpdateOptions,
    ) -> Result<WriteResult, SessionError> {
        self.record(Call::Update(filter.clone(), set.clone(), options))?;
        self.inner.update(filter, set, options).await
    }

    async fn remove(&self, filter: &Filter) -> Result<DeleteResult, SessionError> {
        self.record(Call::Remove(filter.clone()))?;
        self.inner.remove(filter).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64, SessionError> {
        self.record(Call::Count(filter.clone()))?;
        self.inner.count(filter).await
    }

    async fn drop_collection(&self) -> Result<(), SessionError> {
        self.record(Call::Drop)?;
        self.inner.drop_collection().await
    }
}
