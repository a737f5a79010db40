//! Restores sequence order to out-of-order completions.

use std::collections::BTreeMap;

/// Holds items that completed ahead of their turn.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<T> {
    next: usize,
    held: BTreeMap<usize, T>,
}

impl<T> ReorderBuffer<T> {
    pub(crate) const fn new() -> Self {
        Self {
            next: 0,
            held: BTreeMap::new(),
        }
    }

    /// Index of the next item to be released.
    pub(crate) const fn next_index(&self) -> usize {
        self.next
    }

    pub(crate) fn insert(&mut self, index: usize, item: T) {
        debug_assert!(index >= self.next, "item {index} already released");
        self.held.insert(index, item);
    }

    /// Releases the next item if it has arrived.
    pub(crate) fn pop_ready(&mut self) -> Option<(usize, T)> {
        let item = self.held.remove(&self.next)?;
        let index = self.next;
        self.next += 1;
        Some((index, item))
    }

    pub(crate) fn held(&self) -> usize {
        self.held.len()
    }
}
