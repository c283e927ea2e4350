// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failing jobs surface as unsuccessful builds.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn failing_command_reports_exit_status() {
    let farm = Farm::start().await.with_builders(1).await;
    let request = build_of("out", vec![shell_job(0, "out", &[], "echo broken >&2; exit 3")]);

    let result = tokio::time::timeout(SPEC_WAIT, farm.client().build(request)).await.unwrap().unwrap();

    assert!(!result.success);
    assert_eq!(result.error, "exit status 3");
    assert_eq!(result.stdout, "broken\n");
    assert!(result.results.is_empty());
}

#[tokio::test]
async fn failed_dependency_ends_the_build_without_waiting_for_the_link() {
    let farm = Farm::start().await.with_builders(2).await;
    let request = build_of(
        "app",
        vec![
            shell_job(0, "a.o", &[], "exit 1"),
            shell_job(1, "app", &["a.o"], "cat a.o > app"),
        ],
    );

    let result = tokio::time::timeout(SPEC_WAIT, farm.client().build(request)).await.unwrap().unwrap();

    assert!(!result.success);
    assert_eq!(result.error, "exit status 1");
}

#[tokio::test]
async fn job_that_never_writes_its_output_fails() {
    let farm = Farm::start().await.with_builders(1).await;
    let request = build_of("out", vec![shell_job(0, "out", &[], "true")]);

    let result = farm.client().build(request).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error, "no output produced");
}
