//! # Tracing sink for diagnostic events.
//!
//! [`LogWriter`] drains a center's event bus and writes every event through
//! `tracing`: failures at `warn`, lifecycle steps at `debug`.
//!
//! ## Output format
//! ```text
//! [decode-failed] name=sync observer=inbox reason=decode_disallowed_type
//! [dropped] name=sync queue=main reason=full
//! [posted] name=sync key=3f9c….c1d2…
//! ```
//!
//! ## Example
//! ```no_run
//! # use groupcast::{LocalHub, LogWriter};
//! # async fn demo() {
//! let hub = LocalHub::new();
//! hub.grant("group.example");
//! let center = hub.center("group.example").unwrap();
//! let _log = LogWriter::spawn(&center);
//! # }
//! ```

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{Event, EventKind};
use crate::NotificationCenter;

/// Writes diagnostic events to `tracing`.
///
/// Enabled via the `logging` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Spawns a task that logs every event of `center` until the center is gone.
    pub fn spawn(center: &NotificationCenter) -> JoinHandle<()> {
        let mut rx = center.events();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => LogWriter.write(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "log writer lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Writes one event: failures at `warn`, everything else at `debug`.
    pub fn write(&self, e: &Event) {
        let line = Self::line(e);
        if e.is_failure() {
            tracing::warn!(seq = e.seq, "{line}");
        } else {
            tracing::debug!(seq = e.seq, "{line}");
        }
    }

    fn line(e: &Event) -> String {
        let name = e.name.as_deref().unwrap_or("-");
        let observer = e.observer.as_deref().unwrap_or("-");
        let key = e.key.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ObserverAdded => format!("[observer-added] observer={observer} name={name}"),
            EventKind::ObserverRemoved => format!("[observer-removed] observer={observer} count={reason}"),
            EventKind::NotificationPosted => format!("[posted] name={name} key={key}"),
            EventKind::NotificationReceived => {
                format!("[received] name={name} key={key} matched={reason}")
            }
            EventKind::DecodeFailed => {
                format!("[decode-failed] name={name} observer={observer} reason={reason}")
            }
            EventKind::DeliveryDropped => format!("[dropped] name={name} queue={observer} reason={reason}"),
            EventKind::ObserverPanicked => {
                format!("[panicked] name={name} observer={observer} info={reason}")
            }
            EventKind::StageFailed => format!("[stage-failed] name={name} key={key} reason={reason}"),
            EventKind::SignalFailed => format!("[signal-failed] name={name} key={key} reason={reason}"),
            EventKind::SignalLagged => format!("[signal-lagged] skipped={reason}"),
            EventKind::StagedMissing => format!("[staged-missing] key={key} reason={reason}"),
            EventKind::StagedExpired => format!("[staged-expired] name={name} key={key} reason={reason}"),
        }
    }
}
