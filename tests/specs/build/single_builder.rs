// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One builder, one job: the output comes back through the manager.

use crate::prelude::*;
use crate::prelude::assert_eq;

#[tokio::test]
async fn single_job_output_returns_to_client() {
    let farm = Farm::start().await.with_builders(1).await;
    let request = build_of("out.txt", vec![shell_job(0, "out.txt", &[], "echo hi > out.txt")]);

    let mut progress = Vec::new();
    let result = farm
        .client()
        .build_with_progress(request, |s| progress.push(s.percent_complete))
        .await
        .unwrap();

    assert!(result.success, "{}", result.error);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].path, "out.txt");
    assert_eq!(result.results[0].contents, b"hi\n");
    assert_eq!(progress, vec![100.0]);
    assert!(farm.workers[0].session_file(&result.session, "out.txt").exists());

    // Load drops back once the job is reported
    assert_eq!(farm.ctx.queue.loads(), vec![(BuilderId(0), 0)]);
    eventually(|| farm.ctx.sessions.is_empty()).await;
}

#[tokio::test]
async fn shipped_sources_are_materialized_before_the_job_runs() {
    let farm = Farm::start().await.with_builders(1).await;
    let job = shell_job(0, "greeting", &["name.txt"], "printf 'hello %s' \"$(cat name.txt)\" > greeting");
    let mut request = build_of("greeting", vec![job]);
    request.files = HashMap::from([("name.txt".to_string(), File::new("name.txt", "farm"))]);

    let result = farm.client().build(request).await.unwrap();

    assert!(result.success, "{}", result.error);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].contents, b"hello farm");
}
