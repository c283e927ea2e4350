// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO of requests waiting for a worker.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rmake_core::BuilderRequest;
use tokio::sync::Notify;

/// Request queue shared by the message handler and the worker pool.
///
/// With a capacity, `push` waits for room instead of dropping work.
#[derive(Debug, Default)]
pub struct RequestQueue {
    items: Mutex<VecDeque<BuilderRequest>>,
    capacity: Option<usize>,
    not_empty: Notify,
    not_full: Notify,
}

impl RequestQueue {
    pub fn new(capacity: Option<usize>) -> Self {
        Self { capacity, ..Self::default() }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Enqueue without waiting. Hands the request back if the queue is full.
    pub fn try_push(&self, req: BuilderRequest) -> Result<(), BuilderRequest> {
        {
            let mut items = self.items.lock();
            if self.capacity.is_some_and(|cap| items.len() >= cap) {
                return Err(req);
            }
            items.push_back(req);
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue, waiting for room when the queue is full.
    pub async fn push(&self, mut req: BuilderRequest) {
        loop {
            let room = self.not_full.notified();
            tokio::pin!(room);
            room.as_mut().enable();
            match self.try_push(req) {
                Ok(()) => return,
                Err(back) => req = back,
            }
            room.await;
        }
    }

    /// Dequeue without waiting.
    pub fn try_pop(&self) -> Option<BuilderRequest> {
        let req = self.items.lock().pop_front()?;
        self.not_full.notify_one();
        Some(req)
    }

    /// Dequeue, waiting for work when the queue is empty.
    pub async fn pop(&self) -> BuilderRequest {
        loop {
            let work = self.not_empty.notified();
            tokio::pin!(work);
            work.as_mut().enable();
            if let Some(req) = self.try_pop() {
                return req;
            }
            work.await;
        }
    }
}

#[cfg(test)]
#[path = "request_queue_tests.rs"]
mod tests;
