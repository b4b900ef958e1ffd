//! # Diagnostic events emitted by a notification center.
//!
//! Notification delivery is best-effort and never reports failures to observers,
//! so everything that goes wrong (and the main lifecycle steps) is published here
//! instead. Tests and operators subscribe with
//! [`NotificationCenter::events`](crate::NotificationCenter::events).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use groupcast::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DecodeFailed)
//!     .with_name("sync")
//!     .with_observer("inbox")
//!     .with_reason("decode_disallowed_type");
//!
//! assert_eq!(ev.kind, EventKind::DecodeFailed);
//! assert_eq!(ev.name.as_deref(), Some("sync"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Registration ===
    /// An observer entry was added.
    ///
    /// Sets:
    /// - `observer`: observer label
    /// - `name`: name filter, if any
    ObserverAdded,

    /// One or more observer entries were removed.
    ///
    /// Sets:
    /// - `observer`: observer label
    /// - `reason`: number of removed entries
    ObserverRemoved,

    // === Posting ===
    /// A notification was staged and signalled.
    ///
    /// Sets:
    /// - `name`: notification name
    /// - `key`: staging key
    NotificationPosted,

    /// A signal was resolved to a staged envelope and matched locally.
    ///
    /// Sets:
    /// - `name`: notification name
    /// - `key`: staging key
    /// - `reason`: number of matched entries
    NotificationReceived,

    // === Delivery ===
    /// An entry's whitelist rejected the payload; the entry got the
    /// notification without payload.
    ///
    /// Sets:
    /// - `name`: notification name
    /// - `observer`: observer label
    /// - `reason`: decode error label
    DecodeFailed,

    /// A delivery was dropped because the entry's queue was full or closed.
    ///
    /// Sets:
    /// - `name`: notification name
    /// - `observer`: queue label
    /// - `reason`: "full" or "closed"
    DeliveryDropped,

    /// An observer callback panicked; its queue keeps running.
    ///
    /// Sets:
    /// - `name`: notification name
    /// - `observer`: observer label
    /// - `reason`: panic message
    ObserverPanicked,

    // === Transport ===
    /// Writing the staged envelope failed.
    ///
    /// Sets:
    /// - `name`, `key`, `reason`
    StageFailed,

    /// Signalling the group failed; the staged envelope was withdrawn.
    ///
    /// Sets:
    /// - `name`, `key`, `reason`
    SignalFailed,

    /// The signal receiver fell behind and skipped keys.
    ///
    /// Sets:
    /// - `reason`: number of skipped keys
    SignalLagged,

    /// A signalled key had no staged envelope (already expired or never written).
    ///
    /// Sets:
    /// - `key`, `reason`
    StagedMissing,

    /// A staged envelope outlived the retention interval and was ignored.
    ///
    /// Sets:
    /// - `name`, `key`
    StagedExpired,
}

/// Diagnostic event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Notification name, if applicable.
    pub name: Option<Arc<str>>,
    /// Observer or queue label, if applicable.
    pub observer: Option<Arc<str>>,
    /// Staging key, if applicable.
    pub key: Option<Arc<str>>,
    /// Human-readable reason (error labels, counts, panic messages).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            observer: None,
            key: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn with_observer(mut self, observer: impl Into<Arc<str>>) -> Self {
        self.observer = Some(observer.into());
        self
    }

    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a delivery-dropped event.
    #[inline]
    pub fn delivery_dropped(name: &str, queue: &str, reason: &'static str) -> Self {
        Event::new(EventKind::DeliveryDropped)
            .with_name(name)
            .with_observer(queue)
            .with_reason(reason)
    }

    /// Creates an observer panic event.
    #[inline]
    pub fn observer_panicked(name: &str, observer: &str, info: String) -> Self {
        Event::new(EventKind::ObserverPanicked)
            .with_name(name)
            .with_observer(observer)
            .with_reason(info)
    }

    /// True for kinds that report something going wrong; expiry is routine retention.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::DecodeFailed
                | EventKind::DeliveryDropped
                | EventKind::ObserverPanicked
                | EventKind::StageFailed
                | EventKind::SignalFailed
                | EventKind::SignalLagged
                | EventKind::StagedMissing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::NotificationPosted);
        let b = Event::new(EventKind::NotificationPosted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn helpers_fill_fields() {
        let ev = Event::delivery_dropped("sync", "inbox", "full");
        assert_eq!(ev.kind, EventKind::DeliveryDropped);
        assert_eq!(ev.observer.as_deref(), Some("inbox"));
        assert_eq!(ev.reason.as_deref(), Some("full"));
        assert!(ev.is_failure());
        assert!(!Event::new(EventKind::ObserverAdded).is_failure());
        assert!(!Event::new(EventKind::StagedExpired).is_failure());
    }
}
