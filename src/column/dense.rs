//! Dense column storage: one slot per record id, most of which are
//! occupied.

use crate::record_store::RecordId;

/// `Vec<Option<T>>` indexed directly by record id. The occupancy bit the
/// original packs alongside each slot is modeled as `Option<T>` rather
/// than a hand-rolled bitset — Rust's niche optimizations make this
/// cheap for the scalar types this crate stores, and bit-packing here
/// would fight the type system for no behavioral gain.
#[derive(Debug, Clone)]
pub struct DenseColumn<T> {
    slots: Vec<Option<T>>,
}

impl<T: Clone> DenseColumn<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    fn ensure_len(&mut self, idx: usize) {
        if self.slots.len() <= idx {
            self.slots.resize(idx + 1, None);
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&T> {
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn set(&mut self, id: RecordId, value: T) {
        self.ensure_len(id as usize);
        self.slots[id as usize] = Some(value);
    }

    pub fn remove(&mut self, id: RecordId) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = None;
        }
    }

    /// Count of occupied slots, used by `load_factor`.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity_hint(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i as RecordId, v)))
    }
}

impl<T: Clone> Default for DenseColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}
