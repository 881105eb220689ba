//! Document shapes exchanged with a collection
//!
//! A stored session looks like
//! `{ "_id": <sid>, "session": <json string>, "expires": <epoch ms>, ...hook fields }`.

use chrono::Utc;
use serde_json::{Map, Value};

/// A document is a JSON object keyed by top-level field name
pub type Document = Map<String, Value>;

/// Primary key field
pub const ID_FIELD: &str = "_id";

/// Serialized session payload field
pub const SESSION_FIELD: &str = "session";

/// Absolute expiry field, epoch milliseconds
pub const EXPIRES_FIELD: &str = "expires";

/// Current wall-clock time in epoch milliseconds, the unit of `expires`
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Query filters the store issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every document (`{}`)
    All,
    /// The document with this `_id` (`{_id: sid}`)
    Id(String),
    /// Documents with `expires <= at` (`{expires: {$lte: at}}`)
    ExpiresAtOrBefore(i64),
}

impl Filter {
    pub fn id<S: Into<String>>(sid: S) -> Self {
        Filter::Id(sid.into())
    }

    /// Check whether a document satisfies this filter
    ///
    /// Documents without a numeric `expires` never match an expiry filter.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(sid) => doc.get(ID_FIELD).and_then(Value::as_str) == Some(sid.as_str()),
            Filter::ExpiresAtOrBefore(at) => doc
                .get(EXPIRES_FIELD)
                .and_then(Value::as_i64)
                .is_some_and(|expires| expires <= *at),
        }
    }
}

/// Options for [`Collection::update`](crate::collection::Collection::update)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert the document when nothing matches
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self { upsert: true }
    }
}

/// Acknowledgment of an update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteResult {
    /// Documents matched by the filter
    pub matched: u64,
    /// Documents actually changed
    pub modified: u64,
    /// Whether a new document was inserted
    pub upserted: bool,
}

impl WriteResult {
    /// True when the write touched or created a document
    pub fn is_acknowledged(&self) -> bool {
        self.matched > 0 || self.upserted
    }
}

/// Acknowledgment of a removal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted: u64,
}
