//! On-disk stores.
//!
//! Files are named by a truncated SHA-256 of the source URL. Every write goes
//! to a temp file in the same directory and is renamed into place, so readers
//! see either the old or the new value.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use url::Url;

use super::{ContentStore, MetaStore};
use crate::error::{FetcherError, Result};

fn file_stem(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    hex::encode(&hash[..16])
}

fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn remove_optional(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Meta store keeping one JSON file per URL.
#[derive(Debug, Clone)]
pub struct FsMetaStore {
    root: PathBuf,
}

impl FsMetaStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, url: &str) -> PathBuf {
        self.root.join(format!("{}.meta.json", file_stem(url)))
    }

    fn error(url: &str, e: std::io::Error) -> FetcherError {
        FetcherError::MetaStore {
            key: url.to_string(),
            message: e.to_string(),
        }
    }
}

impl MetaStore for FsMetaStore {
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        read_optional(&self.path(url)).map_err(|e| Self::error(url, e))
    }

    fn put(&self, url: &str, value: &[u8]) -> Result<()> {
        write_atomic(&self.root, &self.path(url), value).map_err(|e| Self::error(url, e))
    }

    fn delete(&self, url: &str) -> Result<()> {
        remove_optional(&self.path(url)).map_err(|e| Self::error(url, e))
    }
}

/// Headers kept next to each stored body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSidecar {
    pub source_url: String,
    pub cache_control: String,
    pub content_type: Option<String>,
}

/// Content store keeping each body as a file plus a JSON sidecar.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    ///
    /// A relative root is resolved against the current directory so locators
    /// stay valid `file://` URLs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    /// Get the store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the body for `url` is (or will be) written to.
    pub fn content_path(&self, url: &str) -> PathBuf {
        self.root.join(file_stem(url))
    }

    fn sidecar_path(&self, url: &str) -> PathBuf {
        self.content_path(url).with_extension("headers.json")
    }

    /// Read the sidecar written with the body for `url`.
    pub fn sidecar(&self, url: &str) -> Result<Option<ContentSidecar>> {
        let Some(bytes) = read_optional(&self.sidecar_path(url)).map_err(|e| Self::error(url, e))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| FetcherError::ContentStore {
                key: url.to_string(),
                message: e.to_string(),
            })
    }

    fn error(url: &str, e: std::io::Error) -> FetcherError {
        FetcherError::ContentStore {
            key: url.to_string(),
            message: e.to_string(),
        }
    }
}

impl ContentStore for FsContentStore {
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        read_optional(&self.content_path(url)).map_err(|e| Self::error(url, e))
    }

    fn delete(&self, url: &str) -> Result<()> {
        remove_optional(&self.content_path(url)).map_err(|e| Self::error(url, e))?;
        remove_optional(&self.sidecar_path(url)).map_err(|e| Self::error(url, e))
    }

    fn put_content(
        &self,
        url: &str,
        value: &[u8],
        cache_control: &str,
        content_type: Option<&str>,
    ) -> Result<()> {
        let sidecar = ContentSidecar {
            source_url: url.to_string(),
            cache_control: cache_control.to_string(),
            content_type: content_type.map(String::from),
        };
        let sidecar_json = serde_json::to_vec_pretty(&sidecar).map_err(|e| {
            FetcherError::ContentStore {
                key: url.to_string(),
                message: e.to_string(),
            }
        })?;

        write_atomic(&self.root, &self.content_path(url), value)
            .map_err(|e| Self::error(url, e))?;
        write_atomic(&self.root, &self.sidecar_path(url), &sidecar_json)
            .map_err(|e| Self::error(url, e))
    }

    fn cached_locator(&self, url: &str) -> String {
        let path = self.content_path(url);
        match Url::from_file_path(&path) {
            Ok(locator) => locator.into(),
            Err(()) => format!("file://{}", path.display()),
        }
    }
}
