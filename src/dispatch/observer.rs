//! # Observer callbacks.
//!
//! Every registration stores its callback behind the [`Observe`] trait, whether it was
//! registered as a target (an object implementing `Observe`) or as a closure wrapped in
//! [`ObserverFn`].
//!
//! ## Ownership
//! - **Target registration** keeps only a `Weak` reference: the center never keeps an
//!   observer alive. Entries whose target has been dropped are skipped and pruned.
//!   The target's allocation address is its [`ObserverId`], used for bulk removal.
//! - **Closure registration** owns the closure until the returned token is removed.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use groupcast::{Notification, Observe};
//!
//! struct Inbox;
//!
//! #[async_trait]
//! impl Observe for Inbox {
//!     async fn on_notification(&self, note: &Notification) {
//!         let _ = note.object();
//!     }
//!
//!     fn name(&self) -> &'static str { "inbox" }
//! }
//! ```

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::notification::Notification;

/// Receives delivered notifications.
///
/// Called from the entry's delivery queue worker, never from the posting thread.
/// Deliveries to one entry are sequential (FIFO). Panics are caught and reported as
/// `EventKind::ObserverPanicked`; the queue keeps running.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Handles one notification.
    async fn on_notification(&self, note: &Notification);

    /// Label used in logs and diagnostic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Closure-backed observer.
pub struct ObserverFn<F> {
    label: &'static str,
    f: F,
}

impl<F> ObserverFn<F>
where
    F: Fn(&Notification) + Send + Sync + 'static,
{
    /// Wraps a closure with the default label `"block"`.
    pub fn new(f: F) -> Self {
        Self::named("block", f)
    }

    /// Wraps a closure with a custom label.
    pub fn named(label: &'static str, f: F) -> Self {
        Self { label, f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F> Observe for ObserverFn<F>
where
    F: Fn(&Notification) + Send + Sync + 'static,
{
    async fn on_notification(&self, note: &Notification) {
        (self.f)(note)
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

/// Identity of a target observer: the address of its allocation.
///
/// Stable for as long as any entry references the observer, because entries hold a
/// `Weak` that keeps the allocation reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

impl ObserverId {
    pub fn of<O: ?Sized>(observer: &Arc<O>) -> Self {
        Self(Arc::as_ptr(observer) as *const () as usize)
    }
}

/// Stored callback of one entry.
pub(crate) enum Callback {
    Target(Weak<dyn Observe>),
    Owned(Arc<dyn Observe>),
}

impl Callback {
    pub(crate) fn target<O: Observe>(observer: &Arc<O>) -> Self {
        let strong: Arc<dyn Observe> = observer.clone();
        Callback::Target(Arc::downgrade(&strong))
    }

    /// Upgrades to a callable handle; `None` once a target has been dropped.
    pub(crate) fn resolve(&self) -> Option<Arc<dyn Observe>> {
        match self {
            Callback::Target(weak) => weak.upgrade(),
            Callback::Owned(strong) => Some(Arc::clone(strong)),
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        match self {
            Callback::Target(weak) => weak.strong_count() == 0,
            Callback::Owned(_) => false,
        }
    }
}
