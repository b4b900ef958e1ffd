//! # groupcast
//!
//! **groupcast** is a cross-process notification center for processes that share an
//! app group.
//!
//! Any process attached to a group can post a named notification with an optional
//! string object and an optional structured payload; every process of the group
//! (the poster included) delivers it to its matching observers. Payloads are
//! decoded per observer against a whitelist of permitted types, and delivery is
//! always asynchronous.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  process P1                                              process P2
//! ┌───────────────────────────────┐                       ┌───────────────────────────────┐
//! │ NotificationCenter            │                       │ NotificationCenter            │
//! │  post(note)                   │                       │                               │
//! │   ├─ PayloadCodec::encode     │                       │                               │
//! │   └─ GroupChannel::broadcast ─┼──put(key, record)──┐  │                               │
//! │                               │                    ▼  │                               │
//! │                               │            ┌──────────────┐                           │
//! │                               │            │ StagingStore │◄──get(key)──┐             │
//! │                               │            └──────────────┘             │             │
//! │                               │──signal(group, key)──► Signal ──key──► listener       │
//! │                               │                                         │             │
//! │                               │              DispatchTable::matching ◄──┘             │
//! │                               │                        │                              │
//! │                               │              DeliveryPipeline::deliver                │
//! │                               │               decode(payload, entry.allowed)          │
//! │                               │                        │                              │
//! │                               │          ┌─────────────┼─────────────┐                │
//! │                               │          ▼             ▼             ▼                │
//! │                               │       queue A       queue B       queue C  (FIFO)    │
//! │                               │          ▼             ▼             ▼                │
//! │                               │     on_notification  ...           ...                │
//! └───────────────────────────────┘                       └───────────────────────────────┘
//! ```
//!
//! ### Post lifecycle
//! ```text
//! post(Notification)
//!   ├─► encode payload           (EncodeError → PostError, nothing staged)
//!   ├─► stage record under key   (StageFailed on error)
//!   ├─► signal group with key    (SignalFailed on error, record removed)
//!   ├─► schedule record expiry   (Config::staging_ttl, 0 = never)
//!   └─► return StageKey          (no observer has run yet)
//!
//! on every attached center:
//!   key ─► fetch once ─► match entries ─► per entry: decode with its whitelist
//!                                          ├─ ok   → Notification with user info
//!                                          └─ err  → warn + DecodeFailed, no user info
//!                                        ─► submit to the entry's queue
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Center**        | Register observers, post notifications.                      | [`NotificationCenter`], [`CenterBuilder`]   |
//! | **Observers**     | Targets (not retained) and closures behind one trait.        | [`Observe`], [`ObserverFn`], [`ObserverToken`] |
//! | **Payloads**      | Structured values, type whitelist, wire codec.               | [`Value`], [`AllowedTypes`], [`PayloadCodec`] |
//! | **Transport**     | Group signal and staging area, in-process and on disk.       | [`Signal`], [`StagingStore`], [`LocalHub`], [`DirStore`] |
//! | **Diagnostics**   | Broadcast of everything that happens or goes wrong.          | [`Event`], [`EventKind`]                    |
//! | **Errors**        | Typed errors per layer.                                      | [`ConstructionError`], [`PostError`]        |
//! | **Configuration** | Queue, bus, retention and codec limits.                      | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], which writes diagnostic events through `tracing`.
//!
//! ## Example
//! ```rust
//! use groupcast::{LocalHub, Notification, Value};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = LocalHub::new();
//!     hub.grant("group.com.example");
//!
//!     // two centers on one hub behave like two processes of the group
//!     let editor = hub.center("group.com.example")?;
//!     let viewer = hub.center("group.com.example")?;
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     viewer.add_observer_fn(Some("sync"), None, None, move |note: &Notification| {
//!         let _ = tx.send(note.clone());
//!     });
//!
//!     editor.post(Notification::new("sync").with_object("doc1").with_entry("rev", Value::from(7)))?;
//!
//!     let note = rx.recv().await.ok_or("no delivery")?;
//!     assert_eq!(note.object(), Some("doc1"));
//!     assert_eq!(note.user_info().and_then(|u| u["rev"].as_i64()), Some(7));
//!     Ok(())
//! }
//! ```
mod core;
mod delivery;
mod dispatch;
mod error;
mod events;
mod notification;
mod payload;
mod transport;

// ---- Public re-exports ----

pub use crate::core::{CenterBuilder, Config, NotificationCenter};
pub use delivery::DeliveryQueue;
pub use dispatch::{Observe, ObserverFn, ObserverId, ObserverToken};
pub use error::{ConstructionError, DecodeError, EncodeError, PostError, TransportError};
pub use events::{Bus, Event, EventKind};
pub use notification::{Envelope, Notification};
pub use payload::{AllowedTypes, LocalRef, PayloadCodec, TypeTag, UserInfo, Value, PAYLOAD_VERSION};
pub use transport::{
    topic_for, DirStore, KeyStream, LocalHub, MemoryStore, Signal, StageKey, StagingStore,
    RECORD_VERSION,
};

// Optional: a tracing sink for diagnostic events.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use events::LogWriter;
