//! # Observer entries.
//!
//! One [`ObserverEntry`] per registration: match filters, payload whitelist, delivery
//! queue and callback. Entries are shared (`Arc`) between the table and in-flight
//! delivery batches; removal clears the liveness flag so that a batch that already
//! matched the entry skips it instead of submitting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::delivery::DeliveryQueue;
use crate::dispatch::observer::{Callback, ObserverId};
use crate::payload::AllowedTypes;

/// Who owns an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Owner {
    /// Target registration; removable by identity.
    Target(ObserverId),
    /// Closure/handler registration; removable by token only.
    Token,
}

/// Everything needed to create an entry.
pub(crate) struct Registration {
    pub owner: Owner,
    pub label: Arc<str>,
    pub name: Option<String>,
    pub object: Option<String>,
    pub allowed: AllowedTypes,
    pub queue: DeliveryQueue,
    pub callback: Callback,
}

/// A registered observer.
pub(crate) struct ObserverEntry {
    pub(crate) owner: Owner,
    pub(crate) label: Arc<str>,
    pub(crate) name: Option<String>,
    pub(crate) object: Option<String>,
    pub(crate) allowed: AllowedTypes,
    pub(crate) queue: DeliveryQueue,
    pub(crate) callback: Callback,
    pub(crate) seq: u64,
    live: AtomicBool,
}

impl ObserverEntry {
    pub(crate) fn new(reg: Registration, seq: u64) -> Self {
        Self {
            owner: reg.owner,
            label: reg.label,
            name: reg.name,
            object: reg.object,
            allowed: reg.allowed,
            queue: reg.queue,
            callback: reg.callback,
            seq,
            live: AtomicBool::new(true),
        }
    }

    /// Delivery filter: each side is a wildcard when unset.
    pub fn matches(&self, name: &str, object: Option<&str>) -> bool {
        let name_ok = self.name.as_deref().map_or(true, |n| n == name);
        let object_ok = match self.object.as_deref() {
            None => true,
            Some(o) => object == Some(o),
        };
        name_ok && object_ok
    }

    /// Removal filter: a `None` filter selects everything; a given filter selects
    /// entries stored with that value or with a wildcard.
    pub(crate) fn selected_by(&self, name: Option<&str>, object: Option<&str>) -> bool {
        fn fits(stored: Option<&str>, filter: Option<&str>) -> bool {
            match (stored, filter) {
                (_, None) | (None, _) => true,
                (Some(s), Some(f)) => s == f,
            }
        }
        fits(self.name.as_deref(), name) && fits(self.object.as_deref(), object)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn name_filter(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn object_filter(&self) -> Option<&str> {
        self.object.as_deref()
    }

    /// False once the entry has been removed from its table.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for ObserverEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverEntry")
            .field("label", &self.label)
            .field("name", &self.name)
            .field("object", &self.object)
            .field("seq", &self.seq)
            .field("live", &self.is_live())
            .finish()
    }
}
