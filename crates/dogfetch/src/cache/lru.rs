//! Bounded map with least-recently-used eviction.
//!
//! Bounded by entry count, by total cost, or both. Not synchronized; the
//! owner wraps it in a lock.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

struct Slot<V> {
    value: V,
    cost: usize,
    tick: u64,
}

/// LRU map. A limit of `0` means unbounded.
pub(crate) struct BoundedLru<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Recency order: smallest tick is least recently used.
    order: BTreeMap<u64, K>,
    next_tick: u64,
    total_cost: usize,
    count_limit: usize,
    cost_limit: usize,
    evictions: u64,
}

impl<K: Hash + Eq + Clone, V> BoundedLru<K, V> {
    pub(crate) fn new(count_limit: usize, cost_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            total_cost: 0,
            count_limit,
            cost_limit,
            evictions: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn total_cost(&self) -> usize {
        self.total_cost
    }

    pub(crate) fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Whether a single entry of `cost` can ever be held.
    pub(crate) fn admits(&self, cost: usize) -> bool {
        self.cost_limit == 0 || cost <= self.cost_limit
    }

    /// Look up `key` and mark it most recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.bump();
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.tick);
        self.order.insert(tick, key.clone());
        slot.tick = tick;
        Some(&slot.value)
    }

    /// Insert or replace `key`, then evict until within bounds.
    ///
    /// An entry whose cost alone exceeds the cost limit is not stored, and
    /// any previous value under `key` is dropped.
    pub(crate) fn insert(&mut self, key: K, value: V, cost: usize) {
        self.remove(&key);
        if !self.admits(cost) {
            return;
        }

        let tick = self.bump();
        self.order.insert(tick, key.clone());
        self.entries.insert(key, Slot { value, cost, tick });
        self.total_cost += cost;
        self.evict_to_fit();
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        self.total_cost -= slot.cost;
        Some(slot.value)
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn over_limit(&self) -> bool {
        (self.count_limit != 0 && self.entries.len() > self.count_limit)
            || (self.cost_limit != 0 && self.total_cost > self.cost_limit)
    }

    fn evict_to_fit(&mut self) {
        while self.over_limit() {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            if let Some(slot) = self.entries.remove(&key) {
                self.total_cost -= slot.cost;
                self.evictions += 1;
            }
        }
    }
}
