//! Per-instance priority registry.
//!
//! Keeps, for every event name, the registrations sorted by priority
//! (highest first). Entries with equal priority keep their insertion order.
//!
//! Removed entries are dropped only after the internal borrow is released:
//! a callback may own the [`RegistrationHandle`](crate::RegistrationHandle)
//! of its own batch, and dropping it re-enters the registry.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use hookchain_core::{BatchId, EntryId, Priority};
use serde::Serialize;

use crate::callback::Callback;
use crate::filter::RegistrationFilter;
use crate::source::EventSource;

/// One registration.
pub(crate) struct Entry<T: EventSource> {
    pub(crate) id: EntryId,
    pub(crate) priority: Priority,
    pub(crate) batch: BatchId,
    pub(crate) callback: Callback<T>,
}

impl<T: EventSource> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority,
            batch: self.batch,
            callback: self.callback.clone(),
        }
    }
}

/// A read-only view of one registration, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationInfo {
    pub event: String,
    pub priority: Priority,
    pub position: usize,
    pub entry: EntryId,
    pub batch: BatchId,
}

pub(crate) struct Registry<T: EventSource> {
    events: RefCell<BTreeMap<String, Vec<Entry<T>>>>,
    next_entry: Cell<u64>,
    next_batch: Cell<u64>,
}

impl<T: EventSource> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            events: RefCell::new(BTreeMap::new()),
            next_entry: Cell::new(1),
            next_batch: Cell::new(1),
        }
    }

    /// Allocates a fresh batch id.
    pub(crate) fn next_batch(&self) -> BatchId {
        let raw = self.next_batch.get();
        self.next_batch.set(raw + 1);
        BatchId::new(raw)
    }

    /// Inserts before the first entry with a strictly lower priority.
    pub(crate) fn insert(
        &self,
        event: &str,
        priority: Priority,
        callback: Callback<T>,
        batch: BatchId,
    ) -> EntryId {
        let raw = self.next_entry.get();
        self.next_entry.set(raw + 1);
        let id = EntryId::new(raw);

        let mut events = self.events.borrow_mut();
        let chain = events.entry(event.to_string()).or_default();
        let position = chain
            .iter()
            .position(|entry| entry.priority < priority)
            .unwrap_or(chain.len());
        chain.insert(
            position,
            Entry {
                id,
                priority,
                batch,
                callback,
            },
        );
        id
    }

    /// Copies the current chain for `event`.
    pub(crate) fn snapshot(&self, event: &str) -> Vec<Entry<T>> {
        self.events
            .borrow()
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn remove_entry(&self, id: EntryId) -> usize {
        self.remove_where(|entry| entry.id == id)
    }

    /// Removes the callback from every event it is registered for.
    pub(crate) fn remove_callback(&self, callback: &Callback<T>) -> usize {
        self.remove_where(|entry| entry.callback.ptr_eq(callback))
    }

    pub(crate) fn remove_batch(&self, batch: BatchId) -> usize {
        self.remove_where(|entry| entry.batch == batch)
    }

    pub(crate) fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.events.borrow_mut());
        removed.values().map(Vec::len).sum()
    }

    fn remove_where(&self, pred: impl Fn(&Entry<T>) -> bool) -> usize {
        let mut removed = Vec::new();
        {
            let mut events = self.events.borrow_mut();
            for chain in events.values_mut() {
                let (gone, kept): (Vec<_>, Vec<_>) =
                    std::mem::take(chain).into_iter().partition(|entry| pred(entry));
                *chain = kept;
                removed.extend(gone);
            }
            events.retain(|_, chain| !chain.is_empty());
        }
        removed.len()
    }

    pub(crate) fn contains(&self, event: &str) -> bool {
        self.events.borrow().contains_key(event)
    }

    pub(crate) fn len(&self) -> usize {
        self.events.borrow().values().map(Vec::len).sum()
    }

    /// Lists registrations matching the filter, grouped by event name in
    /// name order, each group in dispatch order.
    pub(crate) fn infos(&self, filter: &RegistrationFilter) -> Vec<RegistrationInfo> {
        self.events
            .borrow()
            .iter()
            .flat_map(|(event, chain)| {
                chain.iter().enumerate().map(move |(position, entry)| RegistrationInfo {
                    event: event.clone(),
                    priority: entry.priority,
                    position,
                    entry: entry.id,
                    batch: entry.batch,
                })
            })
            .filter(|info| filter.matches(info))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::EventHub;

    struct Probe {
        hub: EventHub<Probe>,
    }

    impl EventSource for Probe {
        type Args = ();
        type Output = ();

        fn hub(&self) -> &EventHub<Self> {
            &self.hub
        }
    }

    fn noop() -> Callback<Probe> {
        Callback::inspect(|_, _| {})
    }

    fn priorities(registry: &Registry<Probe>, event: &str) -> Vec<Priority> {
        registry
            .snapshot(event)
            .iter()
            .map(|entry| entry.priority)
            .collect()
    }

    #[test]
    fn test_insert_sorts_by_priority_desc() {
        let registry = Registry::new();
        let batch = registry.next_batch();
        for priority in [0, 10, -5, 3] {
            registry.insert("x", priority, noop(), batch);
        }
        assert_eq!(priorities(&registry, "x"), vec![10, 3, 0, -5]);
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let registry = Registry::new();
        let batch = registry.next_batch();
        let first = registry.insert("x", 0, noop(), batch);
        let high = registry.insert("x", 5, noop(), batch);
        let second = registry.insert("x", 0, noop(), batch);

        let ids: Vec<EntryId> = registry.snapshot("x").iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![high, first, second]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = Registry::new();
        let batch = registry.next_batch();
        registry.insert("x", 0, noop(), batch);

        let snapshot = registry.snapshot("x");
        registry.insert("x", 0, noop(), batch);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.snapshot("x").len(), 2);
    }

    #[test]
    fn test_remove_callback_spans_events() {
        let registry = Registry::new();
        let batch = registry.next_batch();
        let shared = noop();
        registry.insert("a", 0, shared.clone(), batch);
        registry.insert("b", 9, shared.clone(), batch);
        registry.insert("b", 0, noop(), batch);

        assert_eq!(registry.remove_callback(&shared), 2);
        assert!(!registry.contains("a"));
        assert_eq!(priorities(&registry, "b"), vec![0]);
    }

    #[test]
    fn test_remove_batch_only_touches_batch() {
        let registry = Registry::new();
        let one = registry.next_batch();
        let two = registry.next_batch();
        registry.insert("a", 0, noop(), one);
        registry.insert("a", 0, noop(), two);
        registry.insert("b", 0, noop(), one);

        assert_eq!(registry.remove_batch(one), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.remove_batch(one), 0);
    }

    #[test]
    fn test_clear() {
        let registry = Registry::new();
        let batch = registry.next_batch();
        registry.insert("a", 0, noop(), batch);
        registry.insert("b", 0, noop(), batch);

        assert_eq!(registry.clear(), 2);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_infos_positions_and_filter() {
        let registry = Registry::new();
        let batch = registry.next_batch();
        registry.insert("a", -1, noop(), batch);
        registry.insert("a", 4, noop(), batch);
        registry.insert("b", 0, noop(), batch);

        let all = registry.infos(&RegistrationFilter::new());
        assert_eq!(all.len(), 3);
        assert_eq!((all[0].event.as_str(), all[0].priority, all[0].position), ("a", 4, 0));
        assert_eq!((all[1].event.as_str(), all[1].priority, all[1].position), ("a", -1, 1));

        let only_b = registry.infos(&RegistrationFilter::new().with_event("b"));
        assert_eq!(only_b.len(), 1);
    }
}
