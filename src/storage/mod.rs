//! Storage backends for meta records and content bodies.
//!
//! The pipeline only talks to the [`MetaStore`] and [`ContentStore`] traits.
//! Implementations must be safe to share between worker threads and must
//! make a single `put` atomic with respect to `get`/`delete` on the same key.
//!
//! - [`memory`] - in-process maps, used by tests and embedders
//! - [`fs`] - on-disk stores used by the CLI

pub mod fs;
pub mod memory;

pub use fs::{FsContentStore, FsMetaStore};
pub use memory::{ContentEntry, MemoryContentStore, MemoryMetaStore};

use crate::error::Result;

/// Opaque key/value storage for serialized [`crate::cache::Meta`] records.
pub trait MetaStore: Send + Sync {
    /// Read the blob stored for `url`.
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` for `url`, replacing any previous blob.
    fn put(&self, url: &str, value: &[u8]) -> Result<()>;

    /// Remove the blob for `url`. Deleting a missing key is a no-op.
    fn delete(&self, url: &str) -> Result<()>;
}

/// Storage for fetched bodies.
pub trait ContentStore: Send + Sync {
    /// Read the body stored for `url`.
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the body for `url`. Deleting a missing key is a no-op.
    fn delete(&self, url: &str) -> Result<()>;

    /// Store a body with the cache-control hint the backend should serve it
    /// with.
    fn put_content(
        &self,
        url: &str,
        value: &[u8],
        cache_control: &str,
        content_type: Option<&str>,
    ) -> Result<()>;

    /// Externally resolvable address of the body for `url`.
    ///
    /// Must be deterministic and free of I/O; it is valid before anything has
    /// been written.
    fn cached_locator(&self, url: &str) -> String;
}
