//! Opening the on-disk stores shared by every command.

use std::path::Path;

use crate::config::StorageConfig;
use crate::storage::{FsContentStore, FsMetaStore};

/// Meta and content stores under one cache root.
pub struct Stores {
    pub meta: FsMetaStore,
    pub content: FsContentStore,
}

impl Stores {
    /// Open the stores under `storage.root`, or under `root_override`.
    pub fn open(storage: &StorageConfig, root_override: Option<&Path>) -> Self {
        let storage = match root_override {
            Some(root) => StorageConfig {
                root: root.to_path_buf(),
            },
            None => storage.clone(),
        };

        Self {
            meta: FsMetaStore::new(storage.meta_dir()),
            content: FsContentStore::new(storage.content_dir()),
        }
    }
}
