//! # Consumed-key memory.
//!
//! Keeps the post ids a process has already fetched so a signal delivered twice
//! (duplicate wakeups, a lagged stream catching up) does not dispatch twice.
//! Capacity-bounded: the oldest ids are forgotten first.

use std::collections::{HashSet, VecDeque};

use uuid::Uuid;

pub(crate) struct SeenKeys {
    order: VecDeque<Uuid>,
    set: HashSet<Uuid>,
    capacity: usize,
}

impl SeenKeys {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            set: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Records `id`. Returns `false` if it was already present.
    pub fn insert(&mut self, id: Uuid) -> bool {
        if !self.set.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        true
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.order.len()
    }
}
