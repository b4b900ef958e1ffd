//! # Delivery pipeline.
//!
//! Turns one envelope plus its matched entries into queued callback invocations.
//!
//! ## Per entry
//! ```text
//! entry removed?          ──► skip
//! target deallocated?     ──► skip (counted as released, table prunes later)
//! decode(payload, entry.allowed)
//!     ├─ Ok(info)          ──► Notification { name, object, Some(info) }
//!     └─ Err(e)            ──► warn + DecodeFailed, Notification { name, object, None }
//! entry.queue.try_submit  ──► full/closed → DeliveryDropped
//! ```
//!
//! ## Rules
//! - Never runs a callback itself; the caller's thread only enqueues.
//! - One entry's decode failure never affects another entry.
//! - Decoding is memoised per distinct whitelist within one call.

use std::sync::Arc;

use crate::delivery::queue::Delivery;
use crate::dispatch::ObserverEntry;
use crate::error::DecodeError;
use crate::events::{Bus, Event, EventKind};
use crate::notification::{Envelope, Notification};
use crate::payload::{AllowedTypes, PayloadCodec, UserInfo};

/// Outcome of one [`DeliveryPipeline::deliver`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeliveryReport {
    /// Deliveries accepted by a queue.
    pub submitted: usize,
    /// Entries skipped because they were removed after matching.
    pub retired: usize,
    /// Entries skipped because their target observer no longer exists.
    pub released: usize,
    /// Deliveries dropped by a full or closed queue.
    pub dropped: usize,
}

/// Decodes per entry and submits to each entry's queue.
pub(crate) struct DeliveryPipeline {
    codec: PayloadCodec,
    bus: Bus,
}

impl DeliveryPipeline {
    pub fn new(codec: PayloadCodec, bus: Bus) -> Self {
        Self { codec, bus }
    }

    /// Delivers `envelope` to every entry in `entries`.
    pub fn deliver(&self, envelope: &Envelope, entries: &[Arc<ObserverEntry>]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut decoded: Vec<(&AllowedTypes, Result<UserInfo, DecodeError>)> = Vec::new();

        for entry in entries {
            if !entry.is_live() {
                report.retired += 1;
                continue;
            }
            let Some(observer) = entry.callback.resolve() else {
                report.released += 1;
                continue;
            };

            let user_info = match envelope.payload() {
                None => None,
                Some(bytes) => {
                    let idx = match decoded.iter().position(|(a, _)| **a == entry.allowed) {
                        Some(i) => i,
                        None => {
                            decoded.push((&entry.allowed, self.codec.decode(bytes, &entry.allowed)));
                            decoded.len() - 1
                        }
                    };
                    match &decoded[idx].1 {
                        Ok(info) => Some(info.clone()),
                        Err(e) => {
                            self.report_decode_failure(envelope, entry, e);
                            None
                        }
                    }
                }
            };

            let note = Notification::from_parts(
                envelope.name(),
                envelope.object().map(str::to_owned),
                user_info,
            );
            let delivery = Delivery {
                observer,
                label: Arc::clone(&entry.label),
                note,
            };
            match entry.queue.try_submit(delivery) {
                Ok(()) => report.submitted += 1,
                Err(reason) => {
                    report.dropped += 1;
                    tracing::warn!(
                        notification = envelope.name(),
                        queue = entry.queue.label(),
                        reason,
                        "delivery dropped"
                    );
                    self.bus.publish(Event::delivery_dropped(
                        envelope.name(),
                        entry.queue.label(),
                        reason,
                    ));
                }
            }
        }
        report
    }

    fn report_decode_failure(&self, envelope: &Envelope, entry: &ObserverEntry, err: &DecodeError) {
        tracing::warn!(
            notification = envelope.name(),
            observer = %entry.label,
            error = %err,
            "payload rejected by observer whitelist; delivering without user info"
        );
        self.bus.publish(
            Event::new(EventKind::DecodeFailed)
                .with_name(envelope.name())
                .with_observer(Arc::clone(&entry.label))
                .with_reason(err.as_label()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryQueue;
    use crate::dispatch::{Callback, DispatchTable, Observe, ObserverFn, Owner, Registration};
    use crate::payload::{TypeTag, Value};
    use std::time::Duration;
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    type Seen = mpsc::UnboundedReceiver<(String, Option<UserInfo>)>;

    fn recorder(
        table: &DispatchTable,
        bus: &Bus,
        label: &str,
        allowed: AllowedTypes,
    ) -> (Arc<ObserverEntry>, crate::dispatch::ObserverToken, Seen) {
        let (tx, rx) = mpsc::unbounded_channel();
        let obs: Arc<dyn Observe> = ObserverFn::arc(move |n: &Notification| {
            let _ = tx.send((n.name().to_string(), n.user_info().cloned()));
        });
        let (token, entry) = table.register(Registration {
            owner: Owner::Token,
            label: label.into(),
            name: None,
            object: None,
            allowed,
            queue: DeliveryQueue::spawn(&Handle::current(), label, 8, bus.clone()),
            callback: Callback::Owned(obs),
        });
        (entry, token, rx)
    }

    fn envelope_with(info: UserInfo) -> Envelope {
        let codec = PayloadCodec::default();
        Envelope::new("A", Some("x"), Some(codec.encode(&info).unwrap())).unwrap()
    }

    #[tokio::test]
    async fn decode_failure_is_isolated_to_one_entry() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let table = DispatchTable::new();
        let pipeline = DeliveryPipeline::new(PayloadCodec::default(), bus.clone());

        let (_, _, mut strict) = recorder(&table, &bus, "strict", AllowedTypes::new([TypeTag::String]));
        let (_, _, mut lenient) = recorder(&table, &bus, "lenient", AllowedTypes::default());

        let mut info = UserInfo::new();
        info.insert("k".into(), Value::from(42));
        let env = envelope_with(info.clone());

        let report = pipeline.deliver(&env, &table.matching("A", Some("x")));
        assert_eq!(report.submitted, 2);

        assert_eq!(strict.recv().await.unwrap(), ("A".to_string(), None));
        assert_eq!(lenient.recv().await.unwrap(), ("A".to_string(), Some(info)));

        let ev = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev.kind, EventKind::DecodeFailed);
        assert_eq!(ev.observer.as_deref(), Some("strict"));
        assert_eq!(ev.reason.as_deref(), Some("decode_disallowed_type"));
    }

    #[tokio::test]
    async fn deliver_never_runs_callbacks_inline() {
        let bus = Bus::new(16);
        let table = DispatchTable::new();
        let pipeline = DeliveryPipeline::new(PayloadCodec::default(), bus.clone());
        let (_, _, mut rx) = recorder(&table, &bus, "r", AllowedTypes::default());

        let env = Envelope::new("A", None, None).unwrap();
        pipeline.deliver(&env, &table.matching("A", None));
        assert!(rx.try_recv().is_err());

        assert_eq!(rx.recv().await.unwrap(), ("A".to_string(), None));
    }

    #[tokio::test]
    async fn entries_removed_after_matching_are_skipped() {
        let bus = Bus::new(16);
        let table = DispatchTable::new();
        let pipeline = DeliveryPipeline::new(PayloadCodec::default(), bus.clone());
        let (_, token, _rx) = recorder(&table, &bus, "r", AllowedTypes::default());

        let matched = table.matching("A", None);
        table.unregister(token);

        let env = Envelope::new("A", None, None).unwrap();
        let report = pipeline.deliver(&env, &matched);
        assert_eq!(report.retired, 1);
        assert_eq!(report.submitted, 0);
    }
}
