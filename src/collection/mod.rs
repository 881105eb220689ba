//! Document collection backends

mod memory;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::{MemoryCollection, MemoryDatabase};
pub use traits::{Collection, Database};

#[cfg(feature = "redis-store")]
mod redis_collection;

#[cfg(feature = "redis-store")]
pub use redis_collection::{RedisCollection, RedisDatabase};
