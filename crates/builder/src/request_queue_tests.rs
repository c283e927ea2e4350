// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rmake_core::{Job, ResultAddress, SessionToken};
use std::sync::Arc;
use std::time::Duration;

fn request(id: u32) -> BuilderRequest {
    BuilderRequest {
        build_job: Job::new(id, "cc", format!("out{id}")),
        input: Vec::new(),
        wait: Vec::new(),
        result_address: ResultAddress::None,
        session: SessionToken::from_seed(1),
    }
}

#[tokio::test]
async fn pops_in_fifo_order() {
    let queue = RequestQueue::unbounded();
    for id in 0..3 {
        queue.push(request(id)).await;
    }
    assert_eq!(queue.len(), 3);
    for id in 0..3 {
        assert_eq!(queue.pop().await.build_job.id, id);
    }
    assert!(queue.is_empty());
}

#[tokio::test]
async fn pop_waits_for_push() {
    let queue = Arc::new(RequestQueue::unbounded());
    let popper = tokio::spawn({
        let queue = Arc::clone(&queue);
        async move { queue.pop().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!popper.is_finished());
    queue.push(request(7)).await;
    let got = tokio::time::timeout(Duration::from_secs(1), popper).await.unwrap().unwrap();
    assert_eq!(got.build_job.id, 7);
}

#[test]
fn try_push_refuses_when_full() {
    let queue = RequestQueue::new(Some(1));
    assert!(queue.try_push(request(0)).is_ok());
    let back = queue.try_push(request(1)).unwrap_err();
    assert_eq!(back.build_job.id, 1);
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn full_queue_applies_backpressure() {
    let queue = Arc::new(RequestQueue::new(Some(1)));
    queue.push(request(0)).await;

    let pusher = tokio::spawn({
        let queue = Arc::clone(&queue);
        async move { queue.push(request(1)).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!pusher.is_finished(), "push into a full queue returned early");

    assert_eq!(queue.pop().await.build_job.id, 0);
    tokio::time::timeout(Duration::from_secs(1), pusher).await.unwrap().unwrap();
    assert_eq!(queue.pop().await.build_job.id, 1);
}

#[tokio::test]
async fn many_workers_drain_everything_once() {
    let queue = Arc::new(RequestQueue::new(Some(4)));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..25 {
                    seen.push(queue.pop().await.build_job.id);
                }
                seen
            })
        })
        .collect();
    for id in 0..100 {
        queue.push(request(id)).await;
    }
    let mut all = Vec::new();
    for w in workers {
        all.extend(tokio::time::timeout(Duration::from_secs(5), w).await.unwrap().unwrap());
    }
    all.sort_unstable();
    assert_eq!(all, (0..100).collect::<Vec<_>>());
}
