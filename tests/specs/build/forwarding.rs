// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two builders: an intermediate object travels peer to peer.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn object_file_is_forwarded_to_the_linking_builder() {
    let farm = Farm::start().await.with_builders(2).await;
    for worker in &farm.workers {
        let announced = farm.ctx.queue.loads().iter().any(|(id, _)| {
            farm.ctx.builders.get(*id).is_some_and(|bc| bc.listener_addr == worker.listener_addr)
        });
        assert!(announced, "{} was not announced", worker.listener_addr);
    }
    let request = build_of(
        "app",
        vec![
            shell_job(0, "a.o", &[], "echo object-a > a.o"),
            shell_job(1, "app", &["a.o"], "cat a.o > app && echo linked >> app"),
        ],
    );

    let result = farm.client().build(request).await.unwrap();

    assert!(result.success, "{}", result.error);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].path, "app");
    assert_eq!(result.results[0].contents, b"object-a\nlinked\n");

    // Both builders were used: each holds a.o, one built it, one received it
    for worker in &farm.workers {
        let a_o = worker.session_file(&result.session, "a.o");
        assert_eq!(std::fs::read(&a_o).unwrap(), b"object-a\n", "{}", a_o.display());
    }
    let linked: Vec<_> =
        farm.workers.iter().filter(|w| w.session_file(&result.session, "app").exists()).collect();
    assert_eq!(linked.len(), 1);
}

#[tokio::test]
async fn several_objects_fan_in_to_one_link() {
    let farm = Farm::start().await.with_builders(3).await;
    let request = build_of(
        "lib.txt",
        vec![
            shell_job(0, "a.o", &[], "echo a > a.o"),
            shell_job(1, "b.o", &[], "echo b > b.o"),
            shell_job(2, "lib.txt", &["a.o", "b.o"], "cat a.o b.o > lib.txt"),
        ],
    );

    let result = farm.client().build(request).await.unwrap();

    assert!(result.success, "{}", result.error);
    assert_eq!(result.results[0].contents, b"a\nb\n");
    eventually(|| farm.ctx.queue.loads().iter().all(|(_, load)| *load == 0)).await;
}
