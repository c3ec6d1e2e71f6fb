//! Configuration loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File loading in [`loader`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use cached_http_fetcher::config::{parse_config, validate};
//! use std::path::Path;
//!
//! let config = parse_config("min_cache_age: 86400", Path::new("fetcher.yml")).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.fetch_options().min_cache_age, 86400);
//! ```

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{load_config, load_config_file, parse_config};
pub use schema::{FetcherConfig, HttpConfig, RateLimitConfig, StorageConfig, WorkerConfig};
pub use validator::{validate, validate_config, ValidationError, MAX_CACHE_AGE};
