//! # Delivery queues.
//!
//! A [`DeliveryQueue`] is a serial FIFO executor: a bounded channel drained by one
//! worker task. Every observer entry submits to exactly one queue, either one the
//! caller passed at registration or a private queue created for the entry.
//!
//! ## Architecture
//! ```text
//! try_submit(Delivery) ──► [bounded queue] ──► worker ──► observer.on_notification()
//!                                                  └────► panic → ObserverPanicked
//! ```
//!
//! ## Rules
//! - **FIFO**: deliveries submitted to one queue run in submission order, one at a time.
//! - **Non-blocking submit**: a full or closed queue drops the delivery (best-effort).
//! - **Isolation**: a panicking callback is reported and the worker continues.
//! - The worker exits once every handle to the queue has been dropped and the
//!   backlog is drained.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if an observer panics while holding a lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::dispatch::Observe;
use crate::events::{Bus, Event};
use crate::notification::Notification;

/// One pending callback invocation.
pub(crate) struct Delivery {
    pub observer: Arc<dyn Observe>,
    pub label: Arc<str>,
    pub note: Notification,
}

/// Handle to a serial delivery queue. Cheap to clone; clones share the queue.
#[derive(Clone)]
pub struct DeliveryQueue {
    label: Arc<str>,
    tx: mpsc::Sender<Delivery>,
}

impl DeliveryQueue {
    /// Creates a queue and spawns its worker on `runtime`.
    ///
    /// Capacity is clamped to a minimum of 1.
    pub(crate) fn spawn(
        runtime: &Handle,
        label: impl Into<Arc<str>>,
        capacity: usize,
        bus: Bus,
    ) -> Self {
        let label = label.into();
        let (tx, mut rx) = mpsc::channel::<Delivery>(capacity.max(1));

        runtime.spawn(async move {
            while let Some(delivery) = rx.recv().await {
                let fut = delivery.observer.on_notification(&delivery.note);

                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    let info = {
                        let any = &*panic_err;
                        if let Some(msg) = any.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = any.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        }
                    };
                    tracing::error!(
                        observer = %delivery.label,
                        notification = delivery.note.name(),
                        panic = %info,
                        "observer panicked"
                    );
                    bus.publish(Event::observer_panicked(
                        delivery.note.name(),
                        &delivery.label,
                        info,
                    ));
                }
            }
        });

        Self { label, tx }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueues without waiting. Returns the drop reason on failure.
    pub(crate) fn try_submit(&self, delivery: Delivery) -> Result<(), &'static str> {
        match self.tx.try_send(delivery) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err("full"),
            Err(mpsc::error::TrySendError::Closed(_)) => Err("closed"),
        }
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("label", &self.label)
            .finish()
    }
}
