//! Batch orchestration: partition by origin, run both worker pools, drain.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use url::Url;

use super::commit_stage::{CommitPolicy, CommitStats, CommitWorker};
use super::fetch_stage::{FetchStats, FetchWorker};
use super::queue;
use super::result::OriginBatch;
use crate::cache::get_valid_meta;
use crate::error::Result;
use crate::fetch::{HttpOptions, HttpTransport, RateLimiter, Transport};
use crate::storage::{ContentStore, MetaStore};

/// Default pending-item capacity of each work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default TTL floor and content `max-age` hint, in seconds.
pub const DEFAULT_CACHE_AGE: i64 = 3600;

fn available_cpus() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

/// Knobs for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Floor for every TTL and the lifetime of negative cache entries.
    pub min_cache_age: i64,
    /// `max-age` hint stored alongside bodies.
    pub content_max_age: i64,
    /// Admissions per window for each fetch worker; 0 disables limiting.
    pub max_fetch_count: u32,
    pub fetch_count_window: Duration,
    pub num_fetchers: usize,
    pub num_committers: usize,
    pub queue_capacity: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        let cpus = available_cpus();
        Self {
            min_cache_age: DEFAULT_CACHE_AGE,
            content_max_age: DEFAULT_CACHE_AGE,
            max_fetch_count: 0,
            fetch_count_window: Duration::ZERO,
            num_fetchers: cpus * 4,
            num_committers: cpus,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl FetchOptions {
    fn commit_policy(&self) -> CommitPolicy {
        CommitPolicy {
            min_cache_age: self.min_cache_age,
            content_max_age: self.content_max_age,
        }
    }

    fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.max_fetch_count, self.fetch_count_window)
    }
}

/// Outcome counts of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub origins: usize,
    pub urls: usize,
    /// Still fresh; no request made.
    pub skipped: usize,
    /// Requests that produced a response.
    pub fetched: usize,
    /// URLs dropped before a response was obtained.
    pub failed: usize,
    pub stored: usize,
    pub unchanged: usize,
    pub not_modified: usize,
    pub uncacheable: usize,
    pub commit_failed: usize,
}

impl BatchSummary {
    pub fn add_fetch(&mut self, stats: FetchStats) {
        self.skipped += stats.skipped;
        self.fetched += stats.fetched;
        self.failed += stats.failed;
    }

    pub fn add_commit(&mut self, stats: CommitStats) {
        self.stored += stats.stored;
        self.unchanged += stats.unchanged;
        self.not_modified += stats.not_modified;
        self.uncacheable += stats.uncacheable;
        self.commit_failed += stats.failed;
    }

    /// Meta records written during the run.
    pub fn committed(&self) -> usize {
        self.stored + self.unchanged + self.not_modified + self.uncacheable
    }

    /// Whether every URL ended either skipped or committed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.commit_failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} urls across {} origins: {} fresh, {} fetched, {} failed; \
             {} stored, {} unchanged, {} not modified, {} uncacheable, {} commit failures",
            self.urls,
            self.origins,
            self.skipped,
            self.fetched,
            self.failed,
            self.stored,
            self.unchanged,
            self.not_modified,
            self.uncacheable,
            self.commit_failed
        )
    }
}

/// Group URLs by origin (`scheme://host[:port]`).
///
/// URLs are trimmed and de-duplicated; blank lines, unparsable URLs and
/// non-HTTP schemes are dropped with a warning. Batches come out sorted by
/// origin and each batch's URLs are sorted.
pub fn partition_by_origin<I, S>(urls: I) -> Vec<OriginBatch>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut origins: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for raw in urls {
        let url = raw.as_ref().trim();
        if url.is_empty() {
            continue;
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Ignoring invalid url {:?}: {}", url, e);
                continue;
            }
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            warn!("Ignoring non-http url {:?}", url);
            continue;
        }

        origins
            .entry(parsed.origin().ascii_serialization())
            .or_default()
            .insert(url.to_string());
    }

    origins
        .into_iter()
        .map(|(origin, urls)| OriginBatch { origin, urls })
        .collect()
}

fn summary_for(batches: &[OriginBatch]) -> BatchSummary {
    BatchSummary {
        origins: batches.len(),
        urls: batches.iter().map(|b| b.urls.len()).sum(),
        ..BatchSummary::default()
    }
}

/// Fetch-and-commit pipeline over a [`Transport`].
pub struct Pipeline<T: Transport = HttpTransport> {
    options: FetchOptions,
    transport: T,
}

impl Pipeline<HttpTransport> {
    /// Build a pipeline with a real HTTP transport.
    pub fn new(options: FetchOptions, http: HttpOptions) -> Result<Self> {
        Ok(Self::with_transport(options, HttpTransport::new(http)?))
    }
}

impl<T: Transport> Pipeline<T> {
    pub fn with_transport(options: FetchOptions, transport: T) -> Self {
        Self { options, transport }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the batch with concurrent fetch and commit pools.
    ///
    /// Each origin batch is drawn whole by one fetch worker. Fetch workers
    /// are drained and joined before the commit pool is told to stop, so
    /// every produced result is committed before this returns. Individual
    /// URL failures are logged and counted, never returned.
    pub fn run<I, S>(
        &self,
        urls: I,
        meta_store: &dyn MetaStore,
        content_store: &dyn ContentStore,
    ) -> BatchSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batches = partition_by_origin(urls);
        let mut summary = summary_for(&batches);
        if batches.is_empty() {
            return summary;
        }

        let fetchers = self.options.num_fetchers.clamp(1, batches.len());
        let committers = self.options.num_committers.max(1);
        info!(
            "Fetching {} urls across {} origins with {} fetchers and {} committers",
            summary.urls, summary.origins, fetchers, committers
        );

        let transport: &dyn Transport = &self.transport;
        let policy = self.options.commit_policy();
        let (batch_tx, batch_rx) = queue::bounded(self.options.queue_capacity);
        let (result_tx, result_rx) = queue::bounded(self.options.queue_capacity);

        thread::scope(|s| {
            let commit_handles: Vec<_> = (0..committers)
                .map(|_| {
                    let jobs = result_rx.clone();
                    s.spawn(move || {
                        CommitWorker::new(meta_store, content_store, policy).run(&jobs)
                    })
                })
                .collect();

            let fetch_handles: Vec<_> = (0..fetchers)
                .map(|_| {
                    let jobs = batch_rx.clone();
                    let results = result_tx.clone();
                    let limiter = self.options.rate_limiter();
                    s.spawn(move || {
                        FetchWorker::new(transport, meta_store, limiter).run(&jobs, &results)
                    })
                })
                .collect();

            // Workers hold the only receivers, so a dead pool fails pushes
            // instead of blocking them.
            drop(batch_rx);
            drop(result_rx);

            for batch in batches {
                if let Err(e) = batch_tx.push(batch) {
                    error!("Stopping batch feed: {}", e);
                    break;
                }
            }
            batch_tx.stop(fetchers);

            for handle in fetch_handles {
                match handle.join() {
                    Ok(stats) => summary.add_fetch(stats),
                    Err(_) => error!("Fetch worker panicked"),
                }
            }

            result_tx.stop(committers);
            for handle in commit_handles {
                match handle.join() {
                    Ok(stats) => summary.add_commit(stats),
                    Err(_) => error!("Commit worker panicked"),
                }
            }
        });

        info!("{}", summary);
        summary
    }

    /// Run the batch on the calling thread: one fetch pass to completion,
    /// then one commit pass. Deterministic; used by tests.
    pub fn run_single<I, S>(
        &self,
        urls: I,
        meta_store: &dyn MetaStore,
        content_store: &dyn ContentStore,
    ) -> BatchSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batches = partition_by_origin(urls);
        let mut summary = summary_for(&batches);

        let mut fetcher =
            FetchWorker::new(&self.transport, meta_store, self.options.rate_limiter());
        let mut results = Vec::new();
        for batch in &batches {
            fetcher.process_batch(batch, |result| results.push(result));
        }
        summary.add_fetch(fetcher.stats());

        let mut committer =
            CommitWorker::new(meta_store, content_store, self.options.commit_policy());
        for result in &results {
            committer.process(result);
        }
        summary.add_commit(committer.stats());

        info!("{}", summary);
        summary
    }
}

/// Fetch and cache `urls` over HTTP with concurrent worker pools.
pub fn fetch_urls<I, S>(
    urls: I,
    meta_store: &dyn MetaStore,
    content_store: &dyn ContentStore,
    options: FetchOptions,
    http: HttpOptions,
) -> Result<BatchSummary>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(Pipeline::new(options, http)?.run(urls, meta_store, content_store))
}

/// Like [`fetch_urls`] but without concurrency.
pub fn fetch_urls_single<I, S>(
    urls: I,
    meta_store: &dyn MetaStore,
    content_store: &dyn ContentStore,
    options: FetchOptions,
    http: HttpOptions,
) -> Result<BatchSummary>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(Pipeline::new(options, http)?.run_single(urls, meta_store, content_store))
}

/// Cached locator for `url` if its record is fresh at `now`.
///
/// Pure read; never fetches. Negative cache entries yield `None`.
pub fn lookup_at(url: &str, meta_store: &dyn MetaStore, now: i64) -> Result<Option<String>> {
    Ok(get_valid_meta(url, now, meta_store)?.and_then(|meta| meta.cached_locator))
}

/// Cached locator for `url` if its record is fresh now.
pub fn lookup(url: &str, meta_store: &dyn MetaStore) -> Result<Option<String>> {
    lookup_at(url, meta_store, Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{store_meta, Meta};
    use crate::error::FetcherError;
    use crate::fetch::Response;
    use crate::storage::{MemoryContentStore, MemoryMetaStore};
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers 200 with the URL as body; 500 for paths containing "boom",
    /// a transport error for paths containing "down".
    #[derive(Default)]
    struct FakeTransport {
        calls: AtomicUsize,
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str, _headers: &HeaderMap) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("down") {
                return Err(FetcherError::Transport {
                    url: url.into(),
                    attempts: 1,
                    message: "refused".into(),
                });
            }
            let status = if url.contains("boom") {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            Ok(Response {
                requested_url: url.into(),
                final_url: url.into(),
                status,
                headers: HeaderMap::new(),
                body: url.as_bytes().to_vec(),
            })
        }
    }

    fn options() -> FetchOptions {
        FetchOptions {
            min_cache_age: 86_400,
            num_fetchers: 3,
            num_committers: 2,
            queue_capacity: 2,
            ..FetchOptions::default()
        }
    }

    fn urls() -> Vec<String> {
        let mut urls = Vec::new();
        for host in ["a.example", "b.example", "c.example:8080"] {
            for i in 0..4 {
                urls.push(format!("http://{}/{}.jpg", host, i));
            }
        }
        urls
    }

    #[test]
    fn partitions_by_scheme_host_and_port() {
        let batches = partition_by_origin([
            "http://a.example/1",
            "https://a.example/1",
            " http://a.example/2 ",
            "http://a.example:8080/1",
            "http://a.example/1",
        ]);

        let origins: Vec<_> = batches.iter().map(|b| b.origin.as_str()).collect();
        assert_eq!(
            origins,
            vec![
                "http://a.example",
                "http://a.example:8080",
                "https://a.example"
            ]
        );
        assert_eq!(batches[0].urls.len(), 2);
        assert!(batches[0].urls.contains("http://a.example/2"));
    }

    #[test]
    fn partition_drops_invalid_and_non_http() {
        let batches = partition_by_origin(["", "not a url", "ftp://a.example/x", "   "]);
        assert!(batches.is_empty());
    }

    #[test]
    fn default_port_shares_origin() {
        let batches = partition_by_origin(["http://a.example:80/x", "http://a.example/y"]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].origin, "http://a.example");
    }

    #[test]
    fn concurrent_run_commits_every_url() {
        let metas = MemoryMetaStore::new();
        let contents = MemoryContentStore::new();
        let pipeline = Pipeline::with_transport(options(), FakeTransport::default());

        let summary = pipeline.run(urls(), &metas, &contents);

        assert_eq!(summary.origins, 3);
        assert_eq!(summary.urls, 12);
        assert_eq!(summary.fetched, 12);
        assert_eq!(summary.stored, 12);
        assert!(summary.is_clean());
        assert_eq!(metas.len(), 12);
        assert_eq!(contents.write_count(), 12);

        let again = pipeline.run(urls(), &metas, &contents);
        assert_eq!(again.skipped, 12);
        assert_eq!(pipeline.transport().calls.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn single_and_concurrent_modes_agree() {
        let single_metas = MemoryMetaStore::new();
        let single_contents = MemoryContentStore::new();
        let concurrent_metas = MemoryMetaStore::new();
        let concurrent_contents = MemoryContentStore::new();

        let mut input = urls();
        input.push("http://a.example/boom".into());
        input.push("http://b.example/down".into());

        let pipeline = Pipeline::with_transport(options(), FakeTransport::default());
        let single = pipeline.run_single(&input, &single_metas, &single_contents);
        let concurrent = pipeline.run(&input, &concurrent_metas, &concurrent_contents);

        assert_eq!(single, concurrent);
        assert_eq!(single.failed, 1);
        assert_eq!(single.uncacheable, 1);
        assert_eq!(single_metas.keys(), concurrent_metas.keys());
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let metas = MemoryMetaStore::new();
        let contents = MemoryContentStore::new();
        let pipeline = Pipeline::with_transport(options(), FakeTransport::default());

        let summary = pipeline.run(Vec::<String>::new(), &metas, &contents);
        assert_eq!(summary, BatchSummary::default());
    }

    #[test]
    fn lookup_reads_fresh_locators_only() {
        let metas = MemoryMetaStore::new();
        let fresh = Meta {
            cached_locator: Some("memory:http://a.example/x".into()),
            etag: None,
            last_modified: None,
            content_hash: Some("00".into()),
            fetched_at: 100,
            expired_at: 200,
        };
        store_meta("http://a.example/x", &fresh, &metas).unwrap();
        store_meta("http://a.example/neg", &Meta::uncacheable(100, 100), &metas).unwrap();

        assert_eq!(
            lookup_at("http://a.example/x", &metas, 199).unwrap().as_deref(),
            Some("memory:http://a.example/x")
        );
        assert_eq!(lookup_at("http://a.example/x", &metas, 200).unwrap(), None);
        assert_eq!(lookup_at("http://a.example/neg", &metas, 150).unwrap(), None);
        assert_eq!(lookup_at("http://a.example/none", &metas, 0).unwrap(), None);
    }

    #[test]
    fn summary_display_mentions_counts() {
        let summary = BatchSummary {
            origins: 2,
            urls: 5,
            fetched: 5,
            stored: 4,
            uncacheable: 1,
            ..BatchSummary::default()
        };
        let text = summary.to_string();
        assert!(text.starts_with("5 urls across 2 origins"));
        assert!(text.contains("4 stored"));
        assert_eq!(summary.committed(), 5);
    }
}
