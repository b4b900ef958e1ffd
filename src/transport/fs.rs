//! # Directory-backed staging store.
//!
//! [`DirStore`] keeps one file per staged key inside a directory every process of the
//! group can reach (the group's shared container). Writes go to a temporary file in
//! the same directory and are renamed into place, so readers either see the complete
//! record or nothing.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::{StageKey, StagingStore};
use crate::error::TransportError;

/// Staging store rooted at a shared directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Opens (and creates if needed) the staging directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &StageKey) -> PathBuf {
        self.root.join(key.to_string())
    }
}

impl StagingStore for DirStore {
    fn put(&self, key: &StageKey, bytes: Bytes) -> Result<(), TransportError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_data()?;
        tmp.persist(self.path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn get(&self, key: &StageKey) -> Result<Option<Bytes>, TransportError> {
        match fs::read(self.path(key)) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &StageKey) -> Result<(), TransportError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<StageKey>, TransportError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            // in-flight temporary files and foreign files do not parse as keys
            if let Some(key) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
