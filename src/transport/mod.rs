//! Group transport: signalling, staging and the per-center channel on top of them.
//!
//! ## Contents
//! - [`Signal`], [`KeyStream`] one-to-many wakeups scoped to a group
//! - [`StagingStore`], [`MemoryStore`], [`DirStore`] shared keyed blob storage
//! - [`LocalHub`] in-process host of both (entitlements, per-group channels)
//! - [`StageKey`] address of one staged envelope
//! - [`GroupChannel`] stages + signals on post, fetches + dispatches on signal
//!
//! A post travels as: envelope ─► staged record (store) ─► key (signal) ─► every
//! attached center ─► fetch ─► local dispatch.

mod channel;
mod fs;
mod hub;
mod key;
mod record;
mod seen;
mod signal;
mod store;

pub use fs::DirStore;
pub use hub::LocalHub;
pub use key::{topic_for, StageKey};
pub use record::RECORD_VERSION;
pub use signal::{KeyStream, Signal};
pub use store::{MemoryStore, StagingStore};

pub(crate) use channel::{ChannelParts, GroupChannel};
