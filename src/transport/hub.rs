//! # In-memory group host.
//!
//! [`LocalHub`] plays the role of the operating system for a set of centers living in
//! one process: it knows which groups are granted, carries signals between every
//! center attached to a group and holds each group's shared staging area.
//!
//! ```text
//!   center A ──signal──┐                 ┌──► center A listener
//!                      ├──► broadcast ───┼──► center B listener
//!   center B ──signal──┘   (per group)   └──► center C listener
//!
//!   every center of the group ──put/get/delete──► Arc<MemoryStore> (per group)
//! ```
//!
//! Two centers attached to the same hub and group behave as two processes of one app
//! group.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use super::{KeyStream, MemoryStore, Signal, StageKey};
use crate::core::CenterBuilder;
use crate::error::{ConstructionError, TransportError};
use crate::NotificationCenter;

const DEFAULT_SIGNAL_CAPACITY: usize = 1024;

struct GroupState {
    granted: bool,
    tx: broadcast::Sender<StageKey>,
    store: Arc<MemoryStore>,
}

/// Signal and staging host for in-process groups.
pub struct LocalHub {
    groups: RwLock<HashMap<String, GroupState>>,
    capacity: usize,
}

impl LocalHub {
    /// Creates a hub with the default per-group signal capacity.
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_SIGNAL_CAPACITY)
    }

    /// Creates a hub whose per-group signal channel holds `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            groups: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        })
    }

    /// Makes `group` available to every caller of this hub.
    pub fn grant(&self, group: &str) {
        let mut groups = self.groups.write();
        let state = groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState::new(self.capacity));
        state.granted = true;
    }

    pub fn is_granted(&self, group: &str) -> bool {
        self.groups.read().get(group).is_some_and(|s| s.granted)
    }

    /// Shared staging area of `group`.
    pub fn store(&self, group: &str) -> Arc<MemoryStore> {
        let mut groups = self.groups.write();
        let state = groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState::new(self.capacity));
        Arc::clone(&state.store)
    }

    /// Builder for a center attached to `group` through this hub.
    pub fn attach(self: &Arc<Self>, group: &str) -> CenterBuilder {
        CenterBuilder::new(group)
            .with_signal(Arc::clone(self) as Arc<dyn Signal>)
            .with_store(self.store(group))
    }

    /// Center attached to `group` with the default configuration.
    pub fn center(self: &Arc<Self>, group: &str) -> Result<NotificationCenter, ConstructionError> {
        self.attach(group).build()
    }

    fn sender(&self, group: &str) -> Result<broadcast::Sender<StageKey>, TransportError> {
        match self.groups.read().get(group) {
            Some(state) if state.granted => Ok(state.tx.clone()),
            _ => Err(TransportError::NotEntitled(group.to_string())),
        }
    }
}

impl GroupState {
    fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            granted: false,
            tx,
            store: Arc::new(MemoryStore::new()),
        }
    }
}

impl Signal for LocalHub {
    fn signal(&self, group: &str, key: &StageKey) -> Result<(), TransportError> {
        // no receivers is not a failure: nobody is listening right now
        let _ = self.sender(group)?.send(key.clone());
        Ok(())
    }

    fn subscribe(&self, group: &str) -> Result<KeyStream, TransportError> {
        let rx = self.sender(group)?.subscribe();
        let stream = BroadcastStream::new(rx).map(|item| {
            item.map_err(|BroadcastStreamRecvError::Lagged(n)| TransportError::Lagged(n))
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StagingStore;
    use bytes::Bytes;

    #[tokio::test]
    async fn every_subscriber_gets_the_key() {
        let hub = LocalHub::new();
        hub.grant("g");
        let mut a = hub.subscribe("g").unwrap();
        let mut b = hub.subscribe("g").unwrap();

        let key = StageKey::new("g", "sync");
        hub.signal("g", &key).unwrap();

        assert_eq!(a.next().await.unwrap().unwrap(), key);
        assert_eq!(b.next().await.unwrap().unwrap(), key);
    }

    #[tokio::test]
    async fn ungranted_group_is_refused() {
        let hub = LocalHub::new();
        assert!(matches!(hub.subscribe("g"), Err(TransportError::NotEntitled(_))));
        let key = StageKey::new("g", "sync");
        assert!(matches!(hub.signal("g", &key), Err(TransportError::NotEntitled(_))));
    }

    #[tokio::test]
    async fn groups_are_isolated() {
        let hub = LocalHub::new();
        hub.grant("g");
        hub.grant("h");
        let key = StageKey::new("g", "sync");
        hub.store("g").put(&key, Bytes::from_static(b"x")).unwrap();
        assert!(hub.store("h").get(&key).unwrap().is_none());
        assert_eq!(hub.store("g").len(), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_sees_lag() {
        let hub = LocalHub::with_capacity(1);
        hub.grant("g");
        let mut rx = hub.subscribe("g").unwrap();
        for _ in 0..3 {
            hub.signal("g", &StageKey::new("g", "sync")).unwrap();
        }
        assert!(matches!(rx.next().await, Some(Err(TransportError::Lagged(_)))));
        assert!(matches!(rx.next().await, Some(Ok(_))));
    }
}
