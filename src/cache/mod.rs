//! Versioned cache partitions: named request -> response stores.
//!
//! A partition is a named, insertion-ordered mapping from request key to
//! captured response, persisted by the storage backend. Partitions carry a
//! version tag in their name; activation deletes every partition that does
//! not belong to the current version.

mod store;

pub use store::{CachePartitionStore, CachedResponse, MemoryStore, SqliteStore};
