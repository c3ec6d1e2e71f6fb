//! Error types for fetcher operations.
//!
//! This module defines [`FetcherError`], the error type used throughout the
//! crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Per-URL failures (transport, store, malformed records) are values the
//!   pipeline workers branch on; they are logged and never abort a batch
//! - `ProtocolViolation` marks a broken conditional-request contract and is
//!   always logged at error level
//! - Use `anyhow::Error` (via `FetcherError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for fetcher operations.
#[derive(Debug, Error)]
pub enum FetcherError {
    /// The request could not be completed after every retry attempt.
    #[error("Failed to fetch {url} after {attempts} attempt(s): {message}")]
    Transport {
        url: String,
        attempts: u32,
        message: String,
    },

    /// A metadata store operation failed.
    #[error("Meta store error for {key}: {message}")]
    MetaStore { key: String, message: String },

    /// A content store operation failed.
    #[error("Content store error for {key}: {message}")]
    ContentStore { key: String, message: String },

    /// A stored meta record could not be decoded.
    #[error("Malformed meta record for {key}: {message}")]
    MalformedMeta { key: String, message: String },

    /// A response broke the conditional-request contract.
    #[error("Protocol violation for {url}: {message}")]
    ProtocolViolation { url: String, message: String },

    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for fetcher operations.
pub type Result<T> = std::result::Result<T, FetcherError>;
