//! cached-http-fetcher - polite bulk HTTP fetching into a cache.
//!
//! Given a set of URLs, the fetcher downloads each one at most as often as
//! its cache headers allow, revalidates stale copies with conditional
//! requests, stores bodies only when their content changed, and records a
//! [`cache::Meta`] per URL that later reads resolve without touching the
//! network.
//!
//! # Modules
//!
//! - [`cache`] - Cache-Control parsing, expiry, meta records, request planning
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Error types and result aliases
//! - [`fetch`] - HTTP transport with retry, and rate limiting
//! - [`pipeline`] - Origin partitioning and the fetch/commit worker pools
//! - [`storage`] - Meta and content store traits with memory and disk backends
//! - [`ui`] - Terminal output
//!
//! # Example
//!
//! ```
//! use cached_http_fetcher::pipeline::partition_by_origin;
//!
//! let batches = partition_by_origin([
//!     "https://img.example/a.jpg",
//!     "https://img.example/b.jpg",
//!     "http://other.example:8080/c.png",
//! ]);
//! assert_eq!(batches.len(), 2);
//! assert_eq!(batches[1].origin, "https://img.example");
//! ```
//!
//! For end-to-end runs against a live server, see the integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod storage;
pub mod ui;

pub use error::{FetcherError, Result};
