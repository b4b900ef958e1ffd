//! # Group signal capability.
//!
//! The platform primitive that wakes every process attached to a group. It carries
//! only a [`StageKey`]; the envelope itself travels through the
//! [`StagingStore`](super::StagingStore).
//!
//! ## Contract
//! - `signal` is fire-and-forget: it must not wait for any receiver.
//! - Every subscriber of the group, including the signalling process itself, gets
//!   the key once. No backlog is replayed to late subscribers.
//! - A subscriber that falls behind yields `Err(TransportError::Lagged(n))` and
//!   continues with newer keys.

use std::pin::Pin;

use futures::Stream;

use super::StageKey;
use crate::error::TransportError;

/// Stream of signalled keys for one group.
pub type KeyStream = Pin<Box<dyn Stream<Item = Result<StageKey, TransportError>> + Send>>;

/// One-to-many signalling scoped to a group.
pub trait Signal: Send + Sync + 'static {
    /// Notifies every process attached to `group` that `key` was staged.
    fn signal(&self, group: &str, key: &StageKey) -> Result<(), TransportError>;

    /// Attaches to `group`. Fails with `NotEntitled` if the caller is not a member.
    fn subscribe(&self, group: &str) -> Result<KeyStream, TransportError>;
}
