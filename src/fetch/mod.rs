//! Network side of the pipeline.
//!
//! This module provides the HTTP [`Transport`] with retry and backoff, and
//! the per-worker [`RateLimiter`].

pub mod rate_limit;
pub mod retry;
pub mod transport;

pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use transport::{HttpOptions, HttpTransport, Response, Transport, USER_AGENT};
