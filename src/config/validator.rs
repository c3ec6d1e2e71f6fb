//! Configuration validation rules.
//!
//! - Cache ages must lie within `0..=MAX_CACHE_AGE`
//! - At least one HTTP attempt, with a non-zero timeout
//! - Explicit worker counts and the queue capacity must be non-zero

use crate::config::schema::FetcherConfig;
use crate::error::{FetcherError, Result};

/// Largest accepted cache age in seconds.
pub const MAX_CACHE_AGE: i64 = i64::MAX / 4;

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a configuration and return all errors.
pub fn validate_config(config: &FetcherConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (field, age) in [
        ("min_cache_age", config.min_cache_age),
        ("content_max_age", config.content_max_age),
    ] {
        if age < 0 {
            errors.push(ValidationError::new(
                field,
                format!("{} must not be negative", field),
            ));
        } else if age > MAX_CACHE_AGE {
            errors.push(ValidationError::new(
                field,
                format!("{} must be at most {}", field, MAX_CACHE_AGE),
            ));
        }
    }

    if config.workers.fetchers == Some(0) {
        errors.push(ValidationError::new(
            "workers.fetchers",
            "workers.fetchers must be at least 1",
        ));
    }
    if config.workers.committers == Some(0) {
        errors.push(ValidationError::new(
            "workers.committers",
            "workers.committers must be at least 1",
        ));
    }
    if config.workers.queue_capacity == 0 {
        errors.push(ValidationError::new(
            "workers.queue_capacity",
            "workers.queue_capacity must be at least 1",
        ));
    }

    if config.http.max_attempts == 0 {
        errors.push(ValidationError::new(
            "http.max_attempts",
            "http.max_attempts must be at least 1",
        ));
    }
    if config.http.timeout_seconds == 0 {
        errors.push(ValidationError::new(
            "http.timeout_seconds",
            "http.timeout_seconds must be at least 1",
        ));
    }

    errors
}

/// Validate a configuration, failing on the first batch of errors.
pub fn validate(config: &FetcherConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(FetcherError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
