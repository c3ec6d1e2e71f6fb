//! The durable per-URL cache record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{FetcherError, Result};
use crate::storage::MetaStore;

/// Cache record for one source URL.
///
/// `content_hash` is set only when a body has been persisted for the URL;
/// a `cached_locator` of `None` marks the URL as known to be uncacheable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Backend-specific address of the stored body.
    pub cached_locator: Option<String>,
    /// ETag from the most recent 200 response.
    pub etag: Option<String>,
    /// Last-Modified from the most recent 200 response.
    pub last_modified: Option<String>,
    /// Hex-encoded SHA-256 of the stored body.
    pub content_hash: Option<String>,
    /// Unix seconds when this record was produced.
    pub fetched_at: i64,
    /// Unix seconds after which this record is stale.
    pub expired_at: i64,
}

impl Meta {
    /// Record for a URL whose last fetch produced nothing cacheable.
    pub fn uncacheable(fetched_at: i64, min_cache_age: i64) -> Self {
        Self {
            cached_locator: None,
            etag: None,
            last_modified: None,
            content_hash: None,
            fetched_at,
            expired_at: fetched_at.saturating_add(min_cache_age.max(0)),
        }
    }

    /// Whether the record may still be served without revalidation.
    pub fn is_fresh(&self, now: i64) -> bool {
        self.expired_at > now
    }

    /// Whether the record points at a stored body.
    pub fn is_cacheable(&self) -> bool {
        self.cached_locator.is_some()
    }

    /// Seconds until expiry, zero once stale.
    pub fn remaining_ttl(&self, now: i64) -> i64 {
        (self.expired_at - now).max(0)
    }

    /// Serialize for a [`MetaStore`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| FetcherError::Other(e.into()))
    }

    /// Deserialize a record read from a [`MetaStore`].
    pub fn from_bytes(key: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| FetcherError::MalformedMeta {
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}

/// Hex-encoded SHA-256 digest of a response body.
pub fn content_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Load the record for `url`.
///
/// A record that fails to decode is treated as a miss: it is logged and a
/// delete is attempted, whose own failure is only logged. Store read errors
/// are returned to the caller.
pub fn load_meta(url: &str, store: &dyn MetaStore) -> Result<Option<Meta>> {
    let Some(bytes) = store.get(url)? else {
        return Ok(None);
    };

    match Meta::from_bytes(url, &bytes) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) => {
            warn!("Discarding invalid meta data: {}", e);
            if let Err(delete_err) = store.delete(url) {
                warn!("Failed to delete invalid meta for {}: {}", url, delete_err);
            }
            Ok(None)
        }
    }
}

/// Load the record for `url` only if it is still fresh at `now`.
pub fn get_valid_meta(url: &str, now: i64, store: &dyn MetaStore) -> Result<Option<Meta>> {
    Ok(load_meta(url, store)?.filter(|meta| meta.is_fresh(now)))
}

/// Persist the record for `url`, keyed by the requested URL.
pub fn store_meta(url: &str, meta: &Meta, store: &dyn MetaStore) -> Result<()> {
    store.put(url, &meta.to_bytes()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryMetaStore;

    fn sample() -> Meta {
        Meta {
            cached_locator: Some("memory:https://example.com/a.jpg".into()),
            etag: Some("\"abc\"".into()),
            last_modified: Some("Sat, 01 Jan 2000 00:00:00 GMT".into()),
            content_hash: Some(content_hash(b"body")),
            fetched_at: 1_000,
            expired_at: 4_600,
        }
    }

    #[test]
    fn freshness_is_strict() {
        let meta = sample();
        assert!(meta.is_fresh(4_599));
        assert!(!meta.is_fresh(4_600));
    }

    #[test]
    fn uncacheable_meta_has_short_ttl() {
        let meta = Meta::uncacheable(1_000, 3_600);
        assert!(!meta.is_cacheable());
        assert!(meta.content_hash.is_none());
        assert_eq!(meta.expired_at, 4_600);
    }

    #[test]
    fn uncacheable_meta_saturates_huge_floor() {
        let meta = Meta::uncacheable(1_700_000_000, i64::MAX);
        assert_eq!(meta.expired_at, i64::MAX);
        assert!(meta.expired_at >= meta.fetched_at);
    }

    #[test]
    fn remaining_ttl_never_negative() {
        let meta = sample();
        assert_eq!(meta.remaining_ttl(4_000), 600);
        assert_eq!(meta.remaining_ttl(9_000), 0);
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash(b"same"), content_hash(b"same"));
        assert_ne!(content_hash(b"same"), content_hash(b"other"));
        assert_eq!(content_hash(b"").len(), 64);
    }

    #[test]
    fn store_and_load() {
        let store = MemoryMetaStore::new();
        let meta = sample();
        store_meta("https://example.com/a.jpg", &meta, &store).unwrap();

        let loaded = load_meta("https://example.com/a.jpg", &store).unwrap();
        assert_eq!(loaded, Some(meta));
    }

    #[test]
    fn load_missing_returns_none() {
        let store = MemoryMetaStore::new();
        assert!(load_meta("https://example.com/none", &store)
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_meta_is_a_miss_and_deleted() {
        let store = MemoryMetaStore::new();
        store
            .put("https://example.com/bad", b"\x00not json")
            .unwrap();

        let loaded = load_meta("https://example.com/bad", &store).unwrap();
        assert!(loaded.is_none());
        assert!(store.get("https://example.com/bad").unwrap().is_none());
    }

    #[test]
    fn valid_meta_filters_stale_records() {
        let store = MemoryMetaStore::new();
        store_meta("https://example.com/a.jpg", &sample(), &store).unwrap();

        assert!(get_valid_meta("https://example.com/a.jpg", 2_000, &store)
            .unwrap()
            .is_some());
        assert!(get_valid_meta("https://example.com/a.jpg", 5_000, &store)
            .unwrap()
            .is_none());
    }
}
