//! # Diagnostic bus.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] shared by every
//! component of one notification center.
//!
//! ```text
//! Publishers (many):                  Receivers (any number):
//!   DispatchTable ──┐
//!   DeliveryQueue ──┼──────► Bus ───────► NotificationCenter::events()
//!   GroupChannel  ──┘  (broadcast chan)   LogWriter (feature "logging")
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: slow receivers observe `RecvError::Lagged(n)`.
//! - **No persistence**: events are lost if nobody is subscribed.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for diagnostic events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers (dropped if there are none).
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_events_published_after_subscribing() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::SignalLagged));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::StagedMissing));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::StagedMissing);
    }
}
