// src/store.rs

//! Read-only access to digital object files.
//!
//! The catalog stores a directory path and a file name per object; the
//! engine resolves them under a configured storage root. Nothing here
//! writes object bytes; the only trees this engine writes are package
//! working directories it owns.

use crate::config::EngineConfig;
use crate::db::models::DigitalObject;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.storage_root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the on-disk path of a digital object.
    ///
    /// The catalog stores the directory in `path` and the filename in
    /// `name`; both are relative to the storage root.
    pub fn path_for(&self, object: &DigitalObject) -> PathBuf {
        let dir = object.path.trim_matches('/');
        if dir.is_empty() {
            self.root.join(&object.name)
        } else {
            self.root.join(dir).join(&object.name)
        }
    }

    /// Resolve and require the file to exist
    pub fn existing_path_for(&self, object: &DigitalObject) -> Result<PathBuf> {
        let path = self.path_for(object);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::NotFound(format!(
                "object file not found: {}",
                path.display()
            )))
        }
    }
}
