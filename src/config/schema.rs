//! Configuration schema definitions.
//!
//! These structs map to the YAML configuration file format. Every field has
//! a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::{HttpOptions, RetryPolicy, USER_AGENT};
use crate::pipeline::{FetchOptions, DEFAULT_CACHE_AGE, DEFAULT_QUEUE_CAPACITY};

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Lower bound for every computed TTL, in seconds. Also the lifetime of
    /// negative cache entries.
    pub min_cache_age: i64,

    /// `max-age` hint stored with each body for the content backend, in seconds.
    pub content_max_age: i64,

    pub rate_limit: RateLimitConfig,

    pub workers: WorkerConfig,

    pub http: HttpConfig,

    pub storage: StorageConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            min_cache_age: DEFAULT_CACHE_AGE,
            content_max_age: DEFAULT_CACHE_AGE,
            rate_limit: RateLimitConfig::default(),
            workers: WorkerConfig::default(),
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl FetcherConfig {
    /// Pipeline options for this configuration.
    pub fn fetch_options(&self) -> FetchOptions {
        let defaults = FetchOptions::default();
        FetchOptions {
            min_cache_age: self.min_cache_age,
            content_max_age: self.content_max_age,
            max_fetch_count: self.rate_limit.max_fetch_count,
            fetch_count_window: Duration::from_secs(self.rate_limit.window_seconds),
            num_fetchers: self.workers.fetchers.unwrap_or(defaults.num_fetchers),
            num_committers: self.workers.committers.unwrap_or(defaults.num_committers),
            queue_capacity: self.workers.queue_capacity,
        }
    }

    /// Transport options for this configuration.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.http.timeout_seconds),
            user_agent: self.http.user_agent.clone(),
            accept_invalid_certs: self.http.accept_invalid_certs,
            retry: RetryPolicy::new(
                self.http.max_attempts,
                Duration::from_millis(self.http.initial_backoff_ms),
            ),
        }
    }
}

/// Per-worker fetch rate limit. Zero in either field disables limiting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_fetch_count: u32,
    pub window_seconds: u64,
}

/// Worker pool sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Fetch workers; defaults to four per available CPU.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetchers: Option<usize>,

    /// Commit workers; defaults to one per available CPU.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committers: Option<usize>,

    /// Pending items each work queue may hold.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            fetchers: None,
            committers: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Total attempts per URL, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub initial_backoff_ms: u64,
    #[serde(skip_serializing_if = "is_false")]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: USER_AGENT.to_string(),
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: 1000,
            accept_invalid_certs: false,
        }
    }
}

/// Where the CLI keeps meta records and bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".fetcher-cache"),
        }
    }
}

impl StorageConfig {
    pub fn meta_dir(&self) -> PathBuf {
        self.root.join("meta")
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join("content")
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_all_defaults() {
        let config: FetcherConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, FetcherConfig::default());
        assert_eq!(config.min_cache_age, 3600);
        assert_eq!(config.http.max_attempts, 4);
        assert_eq!(config.storage.root, PathBuf::from(".fetcher-cache"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = r#"
min_cache_age: 86400
rate_limit:
  max_fetch_count: 10
workers:
  fetchers: 2
http:
  timeout_seconds: 3
"#;
        let config: FetcherConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.min_cache_age, 86400);
        assert_eq!(config.content_max_age, 3600);
        assert_eq!(config.rate_limit.max_fetch_count, 10);
        assert_eq!(config.rate_limit.window_seconds, 0);
        assert_eq!(config.workers.fetchers, Some(2));
        assert_eq!(config.workers.committers, None);
        assert_eq!(config.workers.queue_capacity, 1024);
        assert_eq!(config.http.timeout_seconds, 3);
        assert_eq!(config.http.user_agent, USER_AGENT);
    }

    #[test]
    fn fetch_options_fill_worker_defaults() {
        let mut config = FetcherConfig::default();
        config.rate_limit.max_fetch_count = 5;
        config.rate_limit.window_seconds = 60;
        config.workers.fetchers = Some(7);

        let options = config.fetch_options();
        assert_eq!(options.num_fetchers, 7);
        assert_eq!(
            options.num_committers,
            FetchOptions::default().num_committers
        );
        assert_eq!(options.max_fetch_count, 5);
        assert_eq!(options.fetch_count_window, Duration::from_secs(60));
    }

    #[test]
    fn http_options_carry_retry_policy() {
        let mut config = FetcherConfig::default();
        config.http.max_attempts = 2;
        config.http.initial_backoff_ms = 250;

        let options = config.http_options();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.retry.max_attempts, 2);
        assert_eq!(options.retry.initial_backoff, Duration::from_millis(250));
    }

    #[test]
    fn storage_dirs_live_under_root() {
        let storage = StorageConfig {
            root: PathBuf::from("/tmp/cache"),
        };
        assert_eq!(storage.meta_dir(), PathBuf::from("/tmp/cache/meta"));
        assert_eq!(storage.content_dir(), PathBuf::from("/tmp/cache/content"));
    }
}
