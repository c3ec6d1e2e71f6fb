//! In-memory stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use super::{ContentStore, MetaStore};
use crate::error::Result;

/// Meta store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryMetaStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryMetaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Remove every record.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl MetaStore for MemoryMetaStore {
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned())
    }

    fn put(&self, url: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, url: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
        Ok(())
    }
}

/// A body held by [`MemoryContentStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub value: Vec<u8>,
    pub cache_control: String,
    pub content_type: Option<String>,
}

/// Content store backed by a `HashMap`, counting every write.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    entries: RwLock<HashMap<String, ContentEntry>>,
    writes: AtomicUsize,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bodies.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total `put_content` calls since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The stored entry for `url`, including its headers.
    pub fn entry(&self, url: &str) -> Option<ContentEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }
}

impl ContentStore for MemoryContentStore {
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entry(url).map(|entry| entry.value))
    }

    fn delete(&self, url: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
        Ok(())
    }

    fn put_content(
        &self,
        url: &str,
        value: &[u8],
        cache_control: &str,
        content_type: Option<&str>,
    ) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                url.to_string(),
                ContentEntry {
                    value: value.to_vec(),
                    cache_control: cache_control.to_string(),
                    content_type: content_type.map(String::from),
                },
            );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn cached_locator(&self, url: &str) -> String {
        format!("memory:{}", url)
    }
}
