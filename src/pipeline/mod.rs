//! The fetch-and-cache pipeline.
//!
//! URLs are grouped by origin, each origin batch is fetched sequentially by
//! one [`FetchWorker`], and every response is handed through a bounded queue
//! to a pool of [`CommitWorker`]s that write content and meta records.

pub mod commit_stage;
pub mod fetch_stage;
pub mod orchestrator;
pub mod queue;
pub mod result;

pub use commit_stage::{commit, CommitOutcome, CommitPolicy, CommitStats, CommitWorker};
pub use fetch_stage::{FetchStats, FetchWorker};
pub use orchestrator::{
    fetch_urls, fetch_urls_single, lookup, lookup_at, partition_by_origin, BatchSummary,
    FetchOptions, Pipeline, DEFAULT_CACHE_AGE, DEFAULT_QUEUE_CAPACITY,
};
pub use result::{FetchResult, OriginBatch};
