//! # Staging store.
//!
//! Keyed blob storage shared by every process of a group. Staged bytes are immutable
//! once written; concurrent readers need nothing beyond the store's own
//! "is this key still present" check.
//!
//! Implementations:
//! - [`MemoryStore`] in-process map, used by [`LocalHub`](super::LocalHub)
//! - [`DirStore`](super::DirStore) one file per key in a shared directory

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use super::StageKey;
use crate::error::TransportError;

/// Keyed blob store scoped to one group.
pub trait StagingStore: Send + Sync + 'static {
    /// Writes `bytes` under `key`.
    fn put(&self, key: &StageKey, bytes: Bytes) -> Result<(), TransportError>;

    /// Reads the bytes under `key`, `None` if absent.
    fn get(&self, key: &StageKey) -> Result<Option<Bytes>, TransportError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &StageKey) -> Result<(), TransportError>;

    /// Lists every staged key. Entries that do not name a staged record are skipped.
    fn keys(&self) -> Result<Vec<StageKey>, TransportError>;
}

/// In-memory staging store.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<StageKey, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StagingStore for MemoryStore {
    fn put(&self, key: &StageKey, bytes: Bytes) -> Result<(), TransportError> {
        self.blobs.write().insert(key.clone(), bytes);
        Ok(())
    }

    fn get(&self, key: &StageKey) -> Result<Option<Bytes>, TransportError> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn delete(&self, key: &StageKey) -> Result<(), TransportError> {
        self.blobs.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<StageKey>, TransportError> {
        Ok(self.blobs.read().keys().cloned().collect())
    }
}
