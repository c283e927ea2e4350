// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builder load queue.
//!
//! A binary min-heap keyed on each builder's `num_jobs`, so the least loaded
//! builder is always at the root. Every connection records its own slot in
//! `index`, which lets a disconnecting builder be removed in O(log n).

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::connection::{BuilderConnection, NOT_QUEUED};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("no builders available")]
    Empty,
    #[error("index {index} out of bounds for queue of {len}")]
    OutOfBounds { index: usize, len: usize },
}

/// `true` when `a` must sit below `b`.
fn cmp(a: &BuilderConnection, b: &BuilderConnection) -> bool {
    a.num_jobs() > b.num_jobs()
}

/// Heap primitives. Callers hold the [`LoadQueue`] lock for every call.
#[derive(Debug, Default)]
pub struct BuilderHeap {
    slots: Vec<Arc<BuilderConnection>>,
}

impl BuilderHeap {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn peek(&self) -> Option<&Arc<BuilderConnection>> {
        self.slots.first()
    }

    pub fn push(&mut self, bc: Arc<BuilderConnection>) {
        bc.set_index(self.slots.len());
        self.slots.push(bc);
        self.perc_up(self.slots.len() - 1);
    }

    pub fn pop(&mut self) -> Result<Arc<BuilderConnection>, QueueError> {
        if self.slots.is_empty() {
            return Err(QueueError::Empty);
        }
        self.remove(0)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.slots.swap(i, j);
        self.slots[i].set_index(i);
        self.slots[j].set_index(j);
    }

    /// Move the element at `i` towards the root. Returns its final slot.
    pub fn perc_up(&mut self, mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !cmp(&self.slots[parent], &self.slots[i]) {
                break;
            }
            self.swap(parent, i);
            i = parent;
        }
        i
    }

    /// Move the element at `i` towards the leaves. Returns its final slot.
    pub fn perc_down(&mut self, mut i: usize) -> usize {
        let len = self.slots.len();
        loop {
            let left = 2 * i + 1;
            if left >= len {
                return i;
            }
            let right = left + 1;
            let child = if right < len && cmp(&self.slots[left], &self.slots[right]) {
                right
            } else {
                left
            };
            if !cmp(&self.slots[i], &self.slots[child]) {
                return i;
            }
            self.swap(i, child);
            i = child;
        }
    }

    /// Remove the element at slot `i`, filling the hole with the last element.
    pub fn remove(&mut self, i: usize) -> Result<Arc<BuilderConnection>, QueueError> {
        let len = self.slots.len();
        if i >= len {
            return Err(QueueError::OutOfBounds { index: i, len });
        }
        let removed = self.slots.swap_remove(i);
        removed.set_index(NOT_QUEUED);
        if i < self.slots.len() {
            self.slots[i].set_index(i);
            if self.perc_up(i) == i {
                self.perc_down(i);
            }
        }
        Ok(removed)
    }

    /// Change the load of the element at slot `i` and restore heap order.
    pub fn set_load_at(&mut self, i: usize, num_jobs: usize) {
        let Some(bc) = self.slots.get(i) else {
            return;
        };
        let previous = bc.num_jobs();
        bc.set_num_jobs(num_jobs);
        if num_jobs < previous {
            self.perc_up(i);
        } else {
            self.perc_down(i);
        }
    }

    fn slot_of(&self, bc: &Arc<BuilderConnection>) -> Option<usize> {
        let i = bc.index();
        self.slots.get(i).filter(|held| Arc::ptr_eq(held, bc)).map(|_| i)
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<BuilderConnection>> {
        self.slots.iter()
    }
}

/// Thread-safe load queue shared by the listener and the dispatcher.
#[derive(Debug, Default)]
pub struct LoadQueue {
    heap: Mutex<BuilderHeap>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, bc: Arc<BuilderConnection>) {
        self.heap.lock().push(bc);
    }

    pub fn pop(&self) -> Result<Arc<BuilderConnection>, QueueError> {
        self.heap.lock().pop()
    }

    pub fn peek(&self) -> Option<Arc<BuilderConnection>> {
        self.heap.lock().peek().cloned()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    pub fn remove(&self, i: usize) -> Result<Arc<BuilderConnection>, QueueError> {
        self.heap.lock().remove(i)
    }

    /// Claim one unit of capacity on the least loaded builder.
    ///
    /// Pop, increment and push happen under one lock acquisition, so two
    /// concurrent dispatches never observe the same stale load.
    pub fn reserve(&self) -> Result<Arc<BuilderConnection>, QueueError> {
        let mut heap = self.heap.lock();
        let bc = heap.peek().cloned().ok_or(QueueError::Empty)?;
        heap.set_load_at(0, bc.num_jobs() + 1);
        Ok(bc)
    }

    /// Overwrite a queued builder's load. No-op if it has left the queue.
    pub fn set_load(&self, bc: &Arc<BuilderConnection>, num_jobs: usize) {
        let mut heap = self.heap.lock();
        if let Some(i) = heap.slot_of(bc) {
            heap.set_load_at(i, num_jobs);
        }
    }

    /// Decrement a queued builder's load, saturating at zero.
    pub fn release(&self, bc: &Arc<BuilderConnection>) {
        let mut heap = self.heap.lock();
        if let Some(i) = heap.slot_of(bc) {
            heap.set_load_at(i, bc.num_jobs().saturating_sub(1));
        }
    }

    /// Remove a builder by its own recorded slot. Returns `false` if it was
    /// not queued.
    pub fn remove_connection(&self, bc: &Arc<BuilderConnection>) -> bool {
        let mut heap = self.heap.lock();
        match heap.slot_of(bc) {
            Some(i) => heap.remove(i).is_ok(),
            None => false,
        }
    }

    /// Snapshot of `(uuid, num_jobs)` in heap order.
    pub fn loads(&self) -> Vec<(rmake_core::BuilderId, usize)> {
        self.heap.lock().iter().map(|bc| (bc.uuid, bc.num_jobs())).collect()
    }

    #[cfg(test)]
    pub(crate) fn with_heap<R>(&self, f: impl FnOnce(&mut BuilderHeap) -> R) -> R {
        f(&mut self.heap.lock())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
