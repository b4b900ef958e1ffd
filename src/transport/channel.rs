//! # Group channel - one center's view of its group transport.
//!
//! ## Posting
//! ```text
//! broadcast(envelope)
//!   ├─► StagedRecord ──bincode──► store.put(key)       fail → StageFailed
//!   ├─► signal.signal(group, key)                      fail → delete(key), SignalFailed
//!   └─► ttl? spawn { sleep(ttl); store.delete(key) }   poster-owned expiry
//! ```
//!
//! ## Receiving (listener task)
//! ```text
//! loop select {
//!   cancel.cancelled()       → exit
//!   stream.next():
//!     Ok(key)      → fetch(key) → table.matching → pipeline.deliver
//!     Err(Lagged)  → SignalLagged, continue
//!     None/Closed  → exit
//!   sweep.tick()             → sweep_expired()
//! }
//! ```
//!
//! ## Rules
//! - Neither side waits for the other: posting ends once the signal is sent.
//! - A key is fetched at most once per center; missing or expired records are
//!   reported and skipped, never retried.
//! - Receivers never delete live records.
//! - Records whose poster exited before its expiry task ran are swept: once when the
//!   center is built and then every TTL while the listener runs.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::record::StagedRecord;
use super::seen::SeenKeys;
use super::{KeyStream, Signal, StageKey, StagingStore};
use crate::delivery::DeliveryPipeline;
use crate::dispatch::DispatchTable;
use crate::error::TransportError;
use crate::events::{Bus, Event, EventKind};
use crate::notification::Envelope;

/// Lower bound on the sweep period for very short TTLs.
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(50);

/// Staging + signalling for one center attached to one group.
pub(crate) struct GroupChannel {
    group: Arc<str>,
    signal: Arc<dyn Signal>,
    store: Arc<dyn StagingStore>,
    origin: Uuid,
    ttl: Option<Duration>,
    record_limit: u64,
    seen: Mutex<SeenKeys>,
    bus: Bus,
    runtime: Handle,
}

pub(crate) struct ChannelParts {
    pub group: Arc<str>,
    pub signal: Arc<dyn Signal>,
    pub store: Arc<dyn StagingStore>,
    pub ttl: Option<Duration>,
    pub record_limit: u64,
    pub seen_capacity: usize,
    pub bus: Bus,
    pub runtime: Handle,
}

impl GroupChannel {
    pub(crate) fn new(parts: ChannelParts) -> Self {
        Self {
            group: parts.group,
            signal: parts.signal,
            store: parts.store,
            origin: Uuid::new_v4(),
            ttl: parts.ttl,
            record_limit: parts.record_limit,
            seen: Mutex::new(SeenKeys::new(parts.seen_capacity)),
            bus: parts.bus,
            runtime: parts.runtime,
        }
    }

    /// Identifier of this center, stamped on every record it stages.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Stages `envelope` and signals the group. Returns once the signal is sent.
    pub fn broadcast(&self, envelope: &Envelope) -> Result<StageKey, TransportError> {
        let key = StageKey::new(&self.group, envelope.name());
        let record = StagedRecord::from_envelope(envelope, self.origin);

        let staged = record
            .to_bytes(self.record_limit)
            .and_then(|bytes| self.store.put(&key, Bytes::from(bytes)));
        if let Err(e) = staged {
            self.report(EventKind::StageFailed, envelope.name(), &key, &e);
            return Err(e);
        }

        if let Err(e) = self.signal.signal(&self.group, &key) {
            if let Err(cleanup) = self.store.delete(&key) {
                tracing::debug!(key = %key, error = %cleanup, "could not unstage unsignalled record");
            }
            self.report(EventKind::SignalFailed, envelope.name(), &key, &e);
            return Err(e);
        }

        self.schedule_expiry(&key);
        Ok(key)
    }

    /// Resolves a signalled key to its envelope, at most once per key.
    pub fn fetch(&self, key: &StageKey) -> Option<Envelope> {
        if !self.seen.lock().insert(key.post()) {
            return None;
        }

        let bytes = match self.store.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %key, "signalled record is gone");
                self.bus.publish(
                    Event::new(EventKind::StagedMissing)
                        .with_key(key.to_string())
                        .with_reason("not_found"),
                );
                return None;
            }
            Err(e) => {
                self.report(EventKind::StagedMissing, "", key, &e);
                return None;
            }
        };

        let record = match StagedRecord::from_bytes(&bytes, self.record_limit) {
            Ok(record) => record,
            Err(e) => {
                self.report(EventKind::StagedMissing, "", key, &e);
                return None;
            }
        };

        if self.is_expired(&record) {
            tracing::debug!(key = %key, notification = %record.name, "ignoring expired record");
            self.bus.publish(
                Event::new(EventKind::StagedExpired)
                    .with_name(record.name.as_str())
                    .with_key(key.to_string()),
            );
            let _ = self.store.delete(key);
            return None;
        }

        tracing::trace!(
            key = %key,
            origin = %record.origin,
            own = record.origin == self.origin,
            age_ms = record.age_ms(),
            "staged record resolved"
        );

        match record.into_envelope() {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                self.report(EventKind::StagedMissing, "", key, &e);
                None
            }
        }
    }

    /// Removes every staged record older than the TTL, whoever posted it.
    ///
    /// Returns the number of records removed. Records that cannot be read or decoded
    /// are left alone; they may belong to a newer format.
    pub(crate) fn sweep_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::debug!(group = %self.group, error = %e, "sweep could not list staged records");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            let Ok(Some(bytes)) = self.store.get(&key) else {
                continue;
            };
            let Ok(record) = StagedRecord::from_bytes(&bytes, self.record_limit) else {
                continue;
            };
            if !self.is_expired(&record) {
                continue;
            }
            match self.store.delete(&key) {
                Ok(()) => {
                    removed += 1;
                    self.bus.publish(
                        Event::new(EventKind::StagedExpired)
                            .with_name(record.name.as_str())
                            .with_key(key.to_string())
                            .with_reason("swept"),
                    );
                }
                Err(e) => tracing::debug!(key = %key, error = %e, "sweep could not remove record"),
            }
        }
        if removed > 0 {
            tracing::debug!(group = %self.group, removed, "swept expired staged records");
        }
        removed
    }

    /// Spawns the listener that turns group signals into local deliveries.
    pub(crate) fn spawn_listener(
        self: &Arc<Self>,
        mut stream: KeyStream,
        table: Arc<DispatchTable>,
        pipeline: Arc<DeliveryPipeline>,
        cancel: CancellationToken,
    ) {
        let me = Arc::clone(self);
        self.runtime.spawn(async move {
            let mut sweep = me.ttl.map(|ttl| {
                let period = ttl.max(MIN_SWEEP_PERIOD);
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(key)) => me.on_signal(&key, &table, &pipeline),
                        Some(Err(TransportError::Lagged(n))) => {
                            tracing::warn!(group = %me.group, skipped = n, "group signal lagged");
                            me.bus.publish(
                                Event::new(EventKind::SignalLagged).with_reason(n.to_string()),
                            );
                        }
                        Some(Err(e)) => {
                            tracing::warn!(group = %me.group, error = %e, "group signal failed");
                            me.bus.publish(
                                Event::new(EventKind::SignalFailed).with_reason(e.as_label()),
                            );
                        }
                        None => break,
                    },
                    _ = async {
                        match sweep.as_mut() {
                            Some(interval) => {
                                interval.tick().await;
                            }
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        me.sweep_expired();
                    }
                }
            }
            tracing::debug!(group = %me.group, "group listener stopped");
        });
    }

    fn on_signal(&self, key: &StageKey, table: &DispatchTable, pipeline: &DeliveryPipeline) {
        let Some(envelope) = self.fetch(key) else {
            return;
        };
        let entries = table.matching(envelope.name(), envelope.object());
        tracing::debug!(
            notification = envelope.name(),
            key = %key,
            matched = entries.len(),
            "notification received"
        );
        self.bus.publish(
            Event::new(EventKind::NotificationReceived)
                .with_name(envelope.name())
                .with_key(key.to_string())
                .with_reason(entries.len().to_string()),
        );

        let report = pipeline.deliver(&envelope, &entries);
        tracing::trace!(
            key = %key,
            submitted = report.submitted,
            retired = report.retired,
            released = report.released,
            dropped = report.dropped,
            "delivery fanned out"
        );
        if report.released > 0 {
            table.prune_released();
        }
    }

    fn schedule_expiry(&self, key: &StageKey) {
        let Some(ttl) = self.ttl else {
            return;
        };
        let store = Arc::clone(&self.store);
        let key = key.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Err(e) = store.delete(&key) {
                tracing::debug!(key = %key, error = %e, "expiry could not remove record");
            }
        });
    }

    fn is_expired(&self, record: &StagedRecord) -> bool {
        self.ttl.is_some_and(|ttl| {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            record.age_ms() > ttl_ms
        })
    }

    fn report(&self, kind: EventKind, name: &str, key: &StageKey, err: &TransportError) {
        tracing::warn!(group = %self.group, key = %key, error = %err, ?kind, "group transport failure");
        let mut ev = Event::new(kind)
            .with_key(key.to_string())
            .with_reason(err.as_label());
        if !name.is_empty() {
            ev = ev.with_name(name);
        }
        self.bus.publish(ev);
    }
}
