//! Session store implementations

mod document_store;
mod traits;

pub use document_store::{modify_fn, DocumentStore, ModifyFn};
pub use traits::SessionStore;
