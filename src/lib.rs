//! # docstore-session
//!
//! Expiring session store for web middleware, persisting sessions as
//! documents in a collection.
//!
//! Every session is stored as one document keyed by its session id:
//!
//! ```text
//! { _id: "<sid>", session: "<json>", expires: <epoch ms>, ...extra fields }
//! ```
//!
//! ## Features
//!
//! - **Store contract**: [`SessionStore`] with get/set/destroy/touch/length/clear
//! - **TTL policy**: fixed TTL, else the cookie's `maxAge` (seconds), else one day
//! - **Reaping**: an owned background task removes expired documents on a fixed interval
//! - **Modify hook**: project extra queryable fields next to the serialized session
//! - **Pluggable collections**: in-memory, Redis, or any [`Collection`] implementation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docstore_session::{DocumentStore, MemoryDatabase, SessionData, SessionStore, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), docstore_session::SessionError> {
//!     let db = MemoryDatabase::new();
//!     let options = StoreOptions::new()
//!         .with_reap_interval_ms(60_000)
//!         .with_log_reaping(true);
//!     let store = DocumentStore::connect(&db, options, None).await?;
//!
//!     let mut session = SessionData::with_max_age(3600);
//!     session.set("user", "alice");
//!     store.set("sid-1", &session).await?;
//!
//!     let loaded = store.get("sid-1").await?;
//!     assert_eq!(loaded, Some(session));
//!
//!     store.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod reaper;
pub mod session;
pub mod store;

pub use collection::{Collection, Database, MemoryCollection, MemoryDatabase};
pub use config::StoreOptions;
pub use document::{DeleteResult, Document, Filter, WriteResult};
pub use error::SessionError;
pub use reaper::ReapingStatus;
pub use session::{SessionCookie, SessionData};
pub use store::{modify_fn, DocumentStore, ModifyFn, SessionStore};

#[cfg(feature = "redis-store")]
pub use collection::{RedisCollection, RedisDatabase};
