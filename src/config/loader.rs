//! Configuration file loading.

use crate::config::schema::FetcherConfig;
use crate::error::{FetcherError, Result};
use std::fs;
use std::path::Path;

/// Load a single config file and parse it into [`FetcherConfig`].
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<FetcherConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FetcherError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            FetcherError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content into [`FetcherConfig`].
///
/// An empty document yields the default configuration.
pub fn parse_config(content: &str, source_path: &Path) -> Result<FetcherConfig> {
    if content.trim().is_empty() {
        return Ok(FetcherConfig::default());
    }

    serde_yaml::from_str(content).map_err(|e| FetcherError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load config from `path` if given, else use the defaults.
pub fn load_config(path: Option<&Path>) -> Result<FetcherConfig> {
    match path {
        Some(path) => load_config_file(path),
        None => Ok(FetcherConfig::default()),
    }
}
