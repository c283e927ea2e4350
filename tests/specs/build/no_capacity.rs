// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling errors come back as failed builds.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn build_without_builders_fails_immediately() {
    let farm = Farm::start().await;
    let request = build_of("out.txt", vec![shell_job(0, "out.txt", &[], "echo hi > out.txt")]);

    let result = farm.client().build(request).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error, "no builders available");
    eventually(|| farm.ctx.sessions.is_empty()).await;
}

#[tokio::test]
async fn unresolvable_dependency_is_rejected_before_dispatch() {
    let farm = Farm::start().await.with_builders(1).await;
    let request = build_of("app", vec![shell_job(0, "app", &["missing.o"], "cat missing.o > app")]);

    let result = farm.client().build(request).await.unwrap();

    assert!(!result.success);
    assert!(result.error.contains("missing.o"), "{}", result.error);
    // Nothing was reserved on the builder
    assert_eq!(farm.ctx.queue.loads(), vec![(BuilderId(0), 0)]);
}

#[tokio::test]
async fn missing_final_job_is_rejected() {
    let farm = Farm::start().await.with_builders(1).await;
    let request = build_of("app", vec![shell_job(0, "a.o", &[], "echo a > a.o")]);

    let result = farm.client().build(request).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error, "no job produces the requested output 'app'");
    assert_eq!(farm.ctx.queue.loads(), vec![(BuilderId(0), 0)]);
}
