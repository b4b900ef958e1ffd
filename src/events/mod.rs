//! Diagnostic events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//! - `LogWriter` (feature `logging`) writes events through `tracing`
//!
//! ## Quick reference
//! - **Publishers**: `NotificationCenter` (registration), `DeliveryPipeline`
//!   (decode failures, dropped deliveries), delivery queue workers (panics),
//!   `GroupChannel` (staging/signal failures, expiry).
//! - **Consumers**: [`NotificationCenter::events`](crate::NotificationCenter::events)
//!   and the optional `LogWriter`.

mod bus;
mod event;
#[cfg(feature = "logging")]
mod log;

pub use bus::Bus;
pub use event::{Event, EventKind};
#[cfg(feature = "logging")]
pub use log::LogWriter;
