//! Commit stage: turn a fetched response into stored content and meta.

use reqwest::StatusCode;
use tracing::{debug, error, warn};

use super::queue::JobReceiver;
use super::result::FetchResult;
use crate::cache::{compute_expiry, content_hash, store_meta, Meta};
use crate::error::{FetcherError, Result};
use crate::storage::{ContentStore, MetaStore};

/// Expiry parameters applied when committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    /// Floor for every computed TTL, and the TTL of negative cache entries.
    pub min_cache_age: i64,
    /// `max-age` hint attached to stored bodies for the content backend.
    pub content_max_age: i64,
}

impl CommitPolicy {
    fn content_cache_control(&self) -> String {
        format!("max-age={}", self.content_max_age.max(0))
    }
}

/// What a commit did for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// 200 with a new body; content was written.
    Stored,
    /// 200 with the same body as before; only meta was refreshed.
    Unchanged,
    /// 304; validators and body carried forward.
    NotModified,
    /// Any other status; a negative cache entry was written.
    Uncacheable,
}

/// Per-worker commit tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub stored: usize,
    pub unchanged: usize,
    pub not_modified: usize,
    pub uncacheable: usize,
    pub failed: usize,
}

impl CommitStats {
    pub fn record(&mut self, outcome: CommitOutcome) {
        match outcome {
            CommitOutcome::Stored => self.stored += 1,
            CommitOutcome::Unchanged => self.unchanged += 1,
            CommitOutcome::NotModified => self.not_modified += 1,
            CommitOutcome::Uncacheable => self.uncacheable += 1,
        }
    }

    pub fn merge(&mut self, other: CommitStats) {
        self.stored += other.stored;
        self.unchanged += other.unchanged;
        self.not_modified += other.not_modified;
        self.uncacheable += other.uncacheable;
        self.failed += other.failed;
    }
}

/// Commit one fetch result.
///
/// The body, if any, is written before meta; a failed body write returns
/// early and leaves the previous meta in place. Meta is always keyed by the
/// requested URL, never the post-redirect one.
pub fn commit(
    result: &FetchResult,
    meta_store: &dyn MetaStore,
    content_store: &dyn ContentStore,
    policy: CommitPolicy,
) -> Result<CommitOutcome> {
    let response = &result.response;
    let expiry = |fetched_at| compute_expiry(fetched_at, policy.min_cache_age, &response.headers);

    let (meta, outcome) = match response.status {
        StatusCode::OK => {
            let hash = content_hash(&response.body);
            let prior_hash = result
                .prior_meta
                .as_ref()
                .and_then(|m| m.content_hash.as_deref());

            let outcome = if prior_hash == Some(hash.as_str()) {
                CommitOutcome::Unchanged
            } else {
                content_store.put_content(
                    &result.url,
                    &response.body,
                    &policy.content_cache_control(),
                    response.content_type(),
                )?;
                CommitOutcome::Stored
            };

            let meta = Meta {
                cached_locator: Some(content_store.cached_locator(&result.url)),
                etag: response.etag().map(str::to_string),
                last_modified: response.last_modified().map(str::to_string),
                content_hash: Some(hash),
                fetched_at: result.fetched_at,
                expired_at: expiry(result.fetched_at),
            };
            (meta, outcome)
        }
        StatusCode::NOT_MODIFIED => {
            let prior = result
                .prior_meta
                .as_ref()
                .filter(|m| m.content_hash.is_some())
                .ok_or_else(|| FetcherError::ProtocolViolation {
                    url: result.url.clone(),
                    message: "304 Not Modified without a stored body to revalidate".into(),
                })?;

            let meta = Meta {
                cached_locator: prior
                    .cached_locator
                    .clone()
                    .or_else(|| Some(content_store.cached_locator(&result.url))),
                etag: prior.etag.clone(),
                last_modified: prior.last_modified.clone(),
                content_hash: prior.content_hash.clone(),
                fetched_at: result.fetched_at,
                expired_at: expiry(result.fetched_at),
            };
            (meta, CommitOutcome::NotModified)
        }
        _ => (
            Meta::uncacheable(result.fetched_at, policy.min_cache_age),
            CommitOutcome::Uncacheable,
        ),
    };

    store_meta(&result.url, &meta, meta_store)?;
    Ok(outcome)
}

/// One commit worker.
pub struct CommitWorker<'a> {
    meta_store: &'a dyn MetaStore,
    content_store: &'a dyn ContentStore,
    policy: CommitPolicy,
    stats: CommitStats,
}

impl<'a> CommitWorker<'a> {
    pub fn new(
        meta_store: &'a dyn MetaStore,
        content_store: &'a dyn ContentStore,
        policy: CommitPolicy,
    ) -> Self {
        Self {
            meta_store,
            content_store,
            policy,
            stats: CommitStats::default(),
        }
    }

    pub fn stats(&self) -> CommitStats {
        self.stats
    }

    /// Commit one result, logging instead of propagating failures.
    pub fn process(&mut self, result: &FetchResult) {
        match commit(result, self.meta_store, self.content_store, self.policy) {
            Ok(outcome) => {
                debug!("Committed {}: {:?}", result.url, outcome);
                self.stats.record(outcome);
            }
            Err(e @ FetcherError::ProtocolViolation { .. }) => {
                self.stats.failed += 1;
                error!("{}", e);
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!("Failed to commit {}: {}", result.url, e);
            }
        }
    }

    /// Consume fetch results until a stop sentinel.
    pub fn run(mut self, jobs: &JobReceiver<FetchResult>) -> CommitStats {
        while let Some(result) = jobs.recv() {
            self.process(&result);
        }
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::load_meta;
    use crate::fetch::Response;
    use crate::storage::{MemoryContentStore, MemoryMetaStore};
    use reqwest::header::{
        HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, ETAG, LAST_MODIFIED,
    };

    const URL: &str = "http://a.example/x";
    const NOW: i64 = 1_700_000_000;

    fn policy() -> CommitPolicy {
        CommitPolicy {
            min_cache_age: 60,
            content_max_age: 600,
        }
    }

    fn response(status: u16, headers: HeaderMap, body: &[u8]) -> Response {
        Response {
            requested_url: URL.into(),
            final_url: URL.into(),
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: body.to_vec(),
        }
    }

    fn fetched(response: Response, prior_meta: Option<Meta>) -> FetchResult {
        FetchResult {
            url: URL.into(),
            fetched_at: NOW,
            response,
            prior_meta,
        }
    }

    fn validators() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("\"v1\""));
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Sat, 01 Jan 2000 00:00:00 GMT"),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpeg"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=7200"));
        headers
    }

    /// Content store whose writes always fail.
    struct BrokenContentStore;

    impl ContentStore for BrokenContentStore {
        fn get(&self, _url: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        fn delete(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        fn put_content(
            &self,
            url: &str,
            _value: &[u8],
            _cache_control: &str,
            _content_type: Option<&str>,
        ) -> Result<()> {
            Err(FetcherError::ContentStore {
                key: url.to_string(),
                message: "bucket unavailable".into(),
            })
        }

        fn cached_locator(&self, url: &str) -> String {
            format!("broken:{}", url)
        }
    }

    #[test]
    fn ok_stores_body_and_meta() {
        let metas = MemoryMetaStore::new();
        let contents = MemoryContentStore::new();
        let result = fetched(response(200, validators(), b"jpeg"), None);

        let outcome = commit(&result, &metas, &contents, policy()).unwrap();
        assert_eq!(outcome, CommitOutcome::Stored);

        let entry = contents.entry(URL).unwrap();
        assert_eq!(entry.value, b"jpeg");
        assert_eq!(entry.cache_control, "max-age=600");
        assert_eq!(entry.content_type.as_deref(), Some("image/jpeg"));

        let meta = load_meta(URL, &metas).unwrap().unwrap();
        assert_eq!(
            meta.cached_locator.as_deref(),
            Some("memory:http://a.example/x")
        );
        assert_eq!(meta.etag.as_deref(), Some("\"v1\""));
        assert_eq!(meta.content_hash, Some(content_hash(b"jpeg")));
        assert_eq!(meta.fetched_at, NOW);
        // max-age=7200 with jitter in [60, 7200].
        assert!(meta.expired_at >= NOW + 60 && meta.expired_at <= NOW + 7200);
    }

    #[test]
    fn same_body_skips_content_write() {
        let metas = MemoryMetaStore::new();
        let contents = MemoryContentStore::new();

        let first = fetched(response(200, validators(), b"jpeg"), None);
        commit(&first, &metas, &contents, policy()).unwrap();
        let prior = load_meta(URL, &metas).unwrap();

        let second = fetched(response(200, HeaderMap::new(), b"jpeg"), prior);
        let outcome = commit(&second, &metas, &contents, policy()).unwrap();

        assert_eq!(outcome, CommitOutcome::Unchanged);
        assert_eq!(contents.write_count(), 1);
        let meta = load_meta(URL, &metas).unwrap().unwrap();
        assert_eq!(meta.content_hash, Some(content_hash(b"jpeg")));
        assert!(meta.etag.is_none());
    }

    #[test]
    fn not_modified_carries_validators_forward() {
        let metas = MemoryMetaStore::new();
        let contents = MemoryContentStore::new();
        let prior = Meta {
            cached_locator: Some("memory:http://a.example/x".into()),
            etag: Some("\"v1\"".into()),
            last_modified: Some("Sat, 01 Jan 2000 00:00:00 GMT".into()),
            content_hash: Some(content_hash(b"jpeg")),
            fetched_at: NOW - 5_000,
            expired_at: NOW - 1,
        };

        let result = fetched(response(304, HeaderMap::new(), b""), Some(prior.clone()));
        let outcome = commit(&result, &metas, &contents, policy()).unwrap();

        assert_eq!(outcome, CommitOutcome::NotModified);
        assert_eq!(contents.write_count(), 0);
        let meta = load_meta(URL, &metas).unwrap().unwrap();
        assert_eq!(meta.etag, prior.etag);
        assert_eq!(meta.last_modified, prior.last_modified);
        assert_eq!(meta.content_hash, prior.content_hash);
        assert_eq!(meta.cached_locator, prior.cached_locator);
        assert_eq!(meta.fetched_at, NOW);
        assert!(meta.is_fresh(NOW));
    }

    #[test]
    fn not_modified_without_prior_is_protocol_violation() {
        let metas = MemoryMetaStore::new();
        let contents = MemoryContentStore::new();

        let result = fetched(response(304, HeaderMap::new(), b""), None);
        let err = commit(&result, &metas, &contents, policy()).unwrap_err();
        assert!(matches!(err, FetcherError::ProtocolViolation { .. }));

        let uncacheable = Meta::uncacheable(NOW - 10, 60);
        let result = fetched(response(304, HeaderMap::new(), b""), Some(uncacheable));
        let err = commit(&result, &metas, &contents, policy()).unwrap_err();
        assert!(matches!(err, FetcherError::ProtocolViolation { .. }));

        assert!(metas.is_empty());
    }

    #[test]
    fn server_error_is_negative_cached() {
        let metas = MemoryMetaStore::new();
        let contents = MemoryContentStore::new();

        let result = fetched(response(500, validators(), b"oops"), None);
        let outcome = commit(&result, &metas, &contents, policy()).unwrap();

        assert_eq!(outcome, CommitOutcome::Uncacheable);
        assert_eq!(contents.write_count(), 0);
        let meta = load_meta(URL, &metas).unwrap().unwrap();
        assert_eq!(meta, Meta::uncacheable(NOW, 60));
    }

    #[test]
    fn failed_body_write_leaves_meta_untouched() {
        let metas = MemoryMetaStore::new();
        let prior = Meta::uncacheable(NOW - 100, 60);
        store_meta(URL, &prior, &metas).unwrap();

        let result = fetched(response(200, validators(), b"jpeg"), Some(prior.clone()));
        let err = commit(&result, &metas, &BrokenContentStore, policy()).unwrap_err();

        assert!(matches!(err, FetcherError::ContentStore { .. }));
        assert_eq!(load_meta(URL, &metas).unwrap(), Some(prior));
    }

    #[test]
    fn worker_survives_failures_and_counts_them() {
        let metas = MemoryMetaStore::new();
        let contents = MemoryContentStore::new();
        let mut worker = CommitWorker::new(&metas, &contents, policy());

        worker.process(&fetched(response(304, HeaderMap::new(), b""), None));
        worker.process(&fetched(response(200, HeaderMap::new(), b"a"), None));
        worker.process(&fetched(response(404, HeaderMap::new(), b""), None));

        assert_eq!(
            worker.stats(),
            CommitStats {
                stored: 1,
                unchanged: 0,
                not_modified: 0,
                uncacheable: 1,
                failed: 1,
            }
        );
    }
}
