//! # Dispatch table - per-process registry of observer entries.
//!
//! ## Architecture
//! ```text
//! register(Registration) ──► slots[i] = Some(entry), generation g ──► ObserverToken { i, g }
//! unregister(token)      ──► slots[i].generation == g ? take + retire + free i
//! matching(name, object) ──► read lock ──► live entries whose filters fit, by registration order
//! ```
//!
//! ## Rules
//! - One `RwLock` guards the arena: `register`/`unregister` are exclusive, `matching`
//!   calls share the read side.
//! - Token removal is O(1); a token whose slot was reused is stale and removes nothing.
//! - Removed entries are retired before the lock is released, so in-flight batches
//!   that matched them skip them.
//! - `matching` is a pure read; results are ordered by registration sequence.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::dispatch::entry::{ObserverEntry, Owner, Registration};
use crate::dispatch::observer::ObserverId;

/// Opaque handle returned by closure/handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken {
    slot: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    entry: Option<Arc<ObserverEntry>>,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_seq: u64,
    len: usize,
}

impl Slots {
    fn take(&mut self, index: usize) -> Option<Arc<ObserverEntry>> {
        let slot = self.slots.get_mut(index)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        entry.retire();
        self.free.push(index as u32);
        self.len -= 1;
        Some(entry)
    }

    fn take_where(&mut self, pred: impl Fn(&ObserverEntry) -> bool) -> Vec<Arc<ObserverEntry>> {
        let hits: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.entry.as_deref().is_some_and(&pred))
            .map(|(i, _)| i)
            .collect();
        hits.into_iter().filter_map(|i| self.take(i)).collect()
    }
}

/// Arena of observer entries guarded by a single read/write lock.
#[derive(Default)]
pub(crate) struct DispatchTable {
    inner: RwLock<Slots>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entry and returns its token.
    pub(crate) fn register(&self, reg: Registration) -> (ObserverToken, Arc<ObserverEntry>) {
        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let entry = Arc::new(ObserverEntry::new(reg, seq));

        let index = match inner.free.pop() {
            Some(i) => i as usize,
            None => {
                inner.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                inner.slots.len() - 1
            }
        };
        let slot = &mut inner.slots[index];
        slot.entry = Some(Arc::clone(&entry));
        let token = ObserverToken {
            slot: index as u32,
            generation: slot.generation,
        };
        inner.len += 1;
        (token, entry)
    }

    /// Removes the entry behind `token`. Stale tokens remove nothing.
    pub fn unregister(&self, token: ObserverToken) -> Option<Arc<ObserverEntry>> {
        let mut inner = self.inner.write();
        let index = token.slot as usize;
        let current = inner.slots.get(index).map(|s| s.generation);
        if current == Some(token.generation) {
            inner.take(index)
        } else {
            None
        }
    }

    /// Removes every entry of `observer` selected by the filters.
    pub fn unregister_observer(
        &self,
        observer: ObserverId,
        name: Option<&str>,
        object: Option<&str>,
    ) -> Vec<Arc<ObserverEntry>> {
        self.inner
            .write()
            .take_where(|e| e.owner == Owner::Target(observer) && e.selected_by(name, object))
    }

    /// Live entries whose filters accept `(name, object)`, in registration order.
    pub fn matching(&self, name: &str, object: Option<&str>) -> Vec<Arc<ObserverEntry>> {
        let inner = self.inner.read();
        let mut hits: Vec<Arc<ObserverEntry>> = inner
            .slots
            .iter()
            .filter_map(|s| s.entry.as_ref())
            .filter(|e| e.matches(name, object))
            .cloned()
            .collect();
        drop(inner);
        hits.sort_unstable_by_key(|e| e.seq);
        hits
    }

    /// Drops target entries whose observer has been deallocated.
    pub fn prune_released(&self) -> usize {
        self.inner.write().take_where(|e| e.callback.is_released()).len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryQueue;
    use crate::dispatch::observer::{Callback, Observe, ObserverFn};
    use crate::events::Bus;
    use crate::notification::Notification;
    use crate::payload::AllowedTypes;
    use async_trait::async_trait;

    struct Target;

    #[async_trait]
    impl Observe for Target {
        async fn on_notification(&self, _note: &Notification) {}
    }

    fn queue() -> DeliveryQueue {
        DeliveryQueue::spawn(&tokio::runtime::Handle::current(), "test", 8, Bus::new(8))
    }

    fn block(name: Option<&str>, object: Option<&str>) -> Registration {
        Registration {
            owner: Owner::Token,
            label: "block".into(),
            name: name.map(str::to_string),
            object: object.map(str::to_string),
            allowed: AllowedTypes::default(),
            queue: queue(),
            callback: Callback::Owned(ObserverFn::arc(|_: &Notification| {})),
        }
    }

    fn target(t: &Arc<Target>, name: Option<&str>, object: Option<&str>) -> Registration {
        Registration {
            owner: Owner::Target(ObserverId::of(t)),
            label: "target".into(),
            name: name.map(str::to_string),
            object: object.map(str::to_string),
            allowed: AllowedTypes::default(),
            queue: queue(),
            callback: Callback::target(t),
        }
    }

    fn seqs(entries: &[Arc<ObserverEntry>]) -> Vec<u64> {
        entries.iter().map(|e| e.seq).collect()
    }

    #[tokio::test]
    async fn wildcard_entry_matches_everything() {
        let table = DispatchTable::new();
        let (_, any) = table.register(block(None, None));

        for (name, object) in [("A", None), ("B", Some("x")), ("C", Some(""))] {
            let hits = table.matching(name, object);
            assert_eq!(seqs(&hits), vec![any.seq]);
        }
    }

    #[tokio::test]
    async fn filters_match_exactly() {
        let table = DispatchTable::new();
        let (_, by_name) = table.register(block(Some("A"), None));
        let (_, by_object) = table.register(block(None, Some("x")));
        let (_, both) = table.register(block(Some("A"), Some("x")));

        assert_eq!(
            seqs(&table.matching("A", Some("x"))),
            vec![by_name.seq, by_object.seq, both.seq]
        );
        assert_eq!(seqs(&table.matching("A", Some("y"))), vec![by_name.seq]);
        assert_eq!(seqs(&table.matching("A", None)), vec![by_name.seq]);
        assert_eq!(seqs(&table.matching("B", Some("x"))), vec![by_object.seq]);
        assert!(table.matching("B", None).is_empty());
    }

    #[tokio::test]
    async fn token_removal_retires_entry_and_ignores_stale_tokens() {
        let table = DispatchTable::new();
        let (first, entry) = table.register(block(Some("A"), None));
        assert!(table.unregister(first).is_some());
        assert!(!entry.is_live());
        assert!(table.matching("A", None).is_empty());

        // slot is reused with a new generation
        let (second, _) = table.register(block(Some("A"), None));
        assert_ne!(first, second);
        assert!(table.unregister(first).is_none());
        assert_eq!(table.len(), 1);
        assert_eq!(table.matching("A", None).len(), 1);
    }

    #[tokio::test]
    async fn registration_order_survives_slot_reuse() {
        let table = DispatchTable::new();
        let (a, _) = table.register(block(None, None));
        let (_, b) = table.register(block(None, None));
        table.unregister(a);
        let (_, c) = table.register(block(None, None));

        assert_eq!(seqs(&table.matching("A", None)), vec![b.seq, c.seq]);
    }

    #[tokio::test]
    async fn identity_removal_honours_filters() {
        let table = DispatchTable::new();
        let t = Arc::new(Target);
        let other = Arc::new(Target);
        table.register(target(&t, Some("A"), None));
        table.register(target(&t, Some("B"), Some("x")));
        table.register(target(&t, None, None));
        table.register(target(&other, Some("A"), None));

        // name filter removes the exact entry and the wildcard one
        let removed = table.unregister_observer(ObserverId::of(&t), Some("A"), None);
        assert_eq!(removed.len(), 2);
        assert_eq!(table.len(), 2);

        let removed = table.unregister_observer(ObserverId::of(&t), None, None);
        assert_eq!(removed.len(), 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.matching("A", None)[0].owner, Owner::Target(ObserverId::of(&other)));
    }

    #[tokio::test]
    async fn released_targets_are_pruned() {
        let table = DispatchTable::new();
        let t = Arc::new(Target);
        table.register(target(&t, None, None));
        table.register(block(None, None));
        drop(t);

        assert_eq!(table.prune_released(), 1);
        assert_eq!(table.len(), 1);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn filter(values: Vec<&'static str>) -> impl Strategy<Value = Option<&'static str>> {
            prop::option::of(prop::sample::select(values))
        }

        proptest! {
            #[test]
            fn matching_selects_exactly_the_entries_whose_filters_agree(
                filters in prop::collection::vec((filter(vec!["A", "B"]), filter(vec!["x", "y"])), 0..12),
                name in prop::sample::select(vec!["A", "B", "C"]),
                object in filter(vec!["x", "y", "z"]),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let _enter = rt.enter();
                let table = DispatchTable::new();
                let registered: Vec<_> = filters
                    .iter()
                    .map(|&(n, o)| (n, o, table.register(block(n, o)).1.seq))
                    .collect();

                let want: Vec<u64> = registered
                    .iter()
                    .filter(|(n, o, _)| n.map_or(true, |n| n == name) && o.map_or(true, |o| Some(o) == object))
                    .map(|&(_, _, seq)| seq)
                    .collect();
                prop_assert_eq!(seqs(&table.matching(name, object)), want);
            }
        }
    }
}
