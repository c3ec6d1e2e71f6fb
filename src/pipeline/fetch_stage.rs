//! Fetch stage: decide, rate limit, and request.

use chrono::Utc;
use tracing::{debug, error, warn};

use super::queue::{JobReceiver, JobSender};
use super::result::{FetchResult, OriginBatch};
use crate::cache::{load_meta, plan, FetchPlan};
use crate::error::Result;
use crate::fetch::{RateLimiter, Transport};
use crate::storage::MetaStore;

/// Per-worker fetch tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// URLs whose record was still fresh.
    pub skipped: usize,
    /// URLs that produced a response.
    pub fetched: usize,
    /// URLs dropped after a transport or store failure.
    pub failed: usize,
}

impl FetchStats {
    pub fn merge(&mut self, other: FetchStats) {
        self.skipped += other.skipped;
        self.fetched += other.fetched;
        self.failed += other.failed;
    }
}

/// One fetch worker. Owns its rate limiter.
pub struct FetchWorker<'a> {
    transport: &'a dyn Transport,
    meta_store: &'a dyn MetaStore,
    limiter: RateLimiter,
    stats: FetchStats,
}

impl<'a> FetchWorker<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        meta_store: &'a dyn MetaStore,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            transport,
            meta_store,
            limiter,
            stats: FetchStats::default(),
        }
    }

    /// Tallies so far.
    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Consume origin batches until a stop sentinel, forwarding results.
    pub fn run(
        mut self,
        jobs: &JobReceiver<OriginBatch>,
        results: &JobSender<FetchResult>,
    ) -> FetchStats {
        while let Some(batch) = jobs.recv() {
            self.process_batch(&batch, |result| {
                let url = result.url.clone();
                if let Err(e) = results.push(result) {
                    error!("Dropping fetched response for {}: {}", url, e);
                }
            });
        }
        self.stats
    }

    /// Process every URL of one origin in order. Failures are logged per URL
    /// and never stop the batch.
    pub fn process_batch(&mut self, batch: &OriginBatch, mut emit: impl FnMut(FetchResult)) {
        debug!("Fetching {} urls from {}", batch.urls.len(), batch.origin);

        for url in &batch.urls {
            match self.process_url(url) {
                Ok(Some(result)) => {
                    self.stats.fetched += 1;
                    emit(result);
                }
                Ok(None) => self.stats.skipped += 1,
                Err(e) => {
                    self.stats.failed += 1;
                    warn!("Skipping {}: {}", url, e);
                }
            }
        }
    }

    /// Fetch one URL if its record is missing or stale.
    ///
    /// Returns `Ok(None)` when the stored record is still fresh.
    pub fn process_url(&mut self, url: &str) -> Result<Option<FetchResult>> {
        let now = Utc::now().timestamp();
        let prior_meta = load_meta(url, self.meta_store)?;

        let conditional = match plan(prior_meta.as_ref(), now) {
            FetchPlan::Skip => {
                debug!("{} is fresh, skipping", url);
                return Ok(None);
            }
            FetchPlan::FetchWith(conditional) => conditional,
        };

        self.limiter.acquire();
        let response = self.transport.get(url, &conditional.to_header_map())?;
        debug!(
            "{} -> {} ({} bytes{})",
            url,
            response.status,
            response.body.len(),
            if conditional.is_conditional() {
                ", conditional"
            } else {
                ""
            }
        );

        Ok(Some(FetchResult {
            url: url.to_string(),
            fetched_at: Utc::now().timestamp(),
            response,
            prior_meta,
        }))
    }
}
