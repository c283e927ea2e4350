// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use rmake_core::test_support::strategies::arb_loads;
use rmake_core::BuilderId;
use tokio::sync::mpsc;

fn conn(id: u32, load: usize) -> Arc<BuilderConnection> {
    let (tx, _rx) = mpsc::unbounded_channel();
    let bc = Arc::new(BuilderConnection::new(BuilderId(id), "host", format!("127.0.0.1:{}", 9000 + id), tx));
    bc.set_num_jobs(load);
    bc
}

fn queue_of(loads: &[usize]) -> (LoadQueue, Vec<Arc<BuilderConnection>>) {
    let queue = LoadQueue::new();
    let conns: Vec<_> = loads.iter().enumerate().map(|(i, &l)| conn(i as u32, l)).collect();
    for bc in &conns {
        queue.push(Arc::clone(bc));
    }
    (queue, conns)
}

fn assert_consistent(queue: &LoadQueue) {
    queue.with_heap(|heap| {
        for (i, bc) in heap.slots.iter().enumerate() {
            assert_eq!(bc.index(), i, "builder {} records a stale slot", bc.uuid);
            if i > 0 {
                let parent = &heap.slots[(i - 1) / 2];
                assert!(parent.num_jobs() <= bc.num_jobs(), "heap order violated at {i}");
            }
        }
    });
}

#[test]
fn pop_on_empty_queue_is_an_error() {
    let queue = LoadQueue::new();
    assert_eq!(queue.pop().unwrap_err(), QueueError::Empty);
    assert_eq!(queue.reserve().unwrap_err(), QueueError::Empty);
    assert!(queue.peek().is_none());
}

#[test]
fn least_loaded_builder_is_at_the_root() {
    let (queue, _) = queue_of(&[5, 3, 9, 1, 4]);
    assert_eq!(queue.peek().unwrap().num_jobs(), 1);
    assert_eq!(queue.len(), 5);
    assert_consistent(&queue);
}

#[test]
fn push_sets_index() {
    let queue = LoadQueue::new();
    let bc = conn(0, 0);
    assert_eq!(bc.index(), NOT_QUEUED);
    queue.push(Arc::clone(&bc));
    assert_eq!(bc.index(), 0);
}

#[test]
fn pop_clears_index() {
    let (queue, conns) = queue_of(&[2]);
    let popped = queue.pop().unwrap();
    assert!(Arc::ptr_eq(&popped, &conns[0]));
    assert_eq!(popped.index(), NOT_QUEUED);
    assert!(queue.is_empty());
}

#[test]
fn remove_out_of_bounds_is_an_error() {
    let (queue, _) = queue_of(&[1, 2]);
    assert_eq!(queue.remove(7).unwrap_err(), QueueError::OutOfBounds { index: 7, len: 2 });
}

#[test]
fn remove_last_slot_needs_no_reheap() {
    let (queue, _) = queue_of(&[1, 2, 3]);
    let removed = queue.remove(2).unwrap();
    assert_eq!(removed.index(), NOT_QUEUED);
    assert_eq!(queue.len(), 2);
    assert_consistent(&queue);
}

#[test]
fn remove_percolates_replacement_up() {
    // [0, 10, 1, 11, 12, 2]: removing slot 3 moves the 2 under 10, which
    // must climb above it.
    let (queue, _) = queue_of(&[0, 10, 1, 11, 12, 2]);
    let i = queue.with_heap(|heap| heap.slots.iter().position(|bc| bc.num_jobs() == 11)).unwrap();
    queue.remove(i).unwrap();
    assert_consistent(&queue);
}

#[test]
fn remove_percolates_replacement_down() {
    let (queue, _) = queue_of(&[0, 1, 5, 2, 3, 6, 7, 20]);
    queue.remove(1).unwrap();
    assert_consistent(&queue);
}

#[test]
fn reserve_increments_the_least_loaded_builder() {
    let (queue, conns) = queue_of(&[0, 0]);
    let first = queue.reserve().unwrap();
    let second = queue.reserve().unwrap();
    assert!(!Arc::ptr_eq(&first, &second), "both reservations hit the same builder");
    assert_eq!(conns[0].num_jobs() + conns[1].num_jobs(), 2);
    assert_consistent(&queue);
}

#[test]
fn set_load_reheapifies_both_ways() {
    let (queue, conns) = queue_of(&[1, 2, 3, 4]);
    queue.set_load(&conns[3], 0);
    assert!(Arc::ptr_eq(&queue.peek().unwrap(), &conns[3]));
    assert_consistent(&queue);

    queue.set_load(&conns[3], 50);
    assert!(Arc::ptr_eq(&queue.peek().unwrap(), &conns[0]));
    assert_consistent(&queue);
}

#[test]
fn release_saturates_at_zero() {
    let (queue, conns) = queue_of(&[0]);
    queue.release(&conns[0]);
    assert_eq!(conns[0].num_jobs(), 0);
}

#[test]
fn remove_connection_ignores_foreign_connections() {
    let (queue, _) = queue_of(&[1, 2]);
    let stranger = conn(99, 0);
    assert!(!queue.remove_connection(&stranger));
    assert_eq!(queue.len(), 2);
}

#[test]
fn set_load_after_removal_is_a_noop() {
    let (queue, conns) = queue_of(&[1, 2, 3]);
    assert!(queue.remove_connection(&conns[1]));
    queue.set_load(&conns[1], 0);
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.peek().unwrap().num_jobs(), 1);
}

proptest! {
    #[test]
    fn pops_come_out_in_load_order(loads in arb_loads(32)) {
        let (queue, _) = queue_of(&loads);
        let mut popped = Vec::new();
        while let Ok(bc) = queue.pop() {
            popped.push(bc.num_jobs());
        }
        let mut sorted = loads.clone();
        sorted.sort_unstable();
        prop_assert_eq!(popped, sorted);
    }

    #[test]
    fn removal_by_index_keeps_heap_consistent(
        loads in arb_loads(32),
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..8),
    ) {
        let (queue, conns) = queue_of(&loads);
        for pick in picks {
            let bc = pick.get(&conns);
            queue.remove_connection(bc);
            assert_consistent(&queue);
        }
    }

    #[test]
    fn load_updates_keep_heap_consistent(
        loads in arb_loads(32),
        updates in proptest::collection::vec((any::<prop::sample::Index>(), 0usize..64), 1..16),
    ) {
        let (queue, conns) = queue_of(&loads);
        for (pick, load) in updates {
            queue.set_load(pick.get(&conns), load);
            assert_consistent(&queue);
        }
        let min = conns.iter().map(|bc| bc.num_jobs()).min();
        prop_assert_eq!(queue.peek().map(|bc| bc.num_jobs()), min);
    }
}
