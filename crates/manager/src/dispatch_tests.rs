// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rmake_core::test_support::compile_and_link;
use rmake_core::{File, Job};
use rmake_wire::Message;
use std::collections::HashMap;
use tokio::sync::mpsc;

struct Farm {
    queue: LoadQueue,
    conns: Vec<Arc<BuilderConnection>>,
    inboxes: Vec<mpsc::UnboundedReceiver<Message>>,
}

fn farm(n: u32) -> Farm {
    let queue = LoadQueue::new();
    let mut conns = Vec::new();
    let mut inboxes = Vec::new();
    for id in 0..n {
        let (tx, rx) = mpsc::unbounded_channel();
        let bc = Arc::new(BuilderConnection::new(
            BuilderId(id),
            format!("node{id}"),
            format!("10.0.0.{id}:11222"),
            tx,
        ));
        queue.push(Arc::clone(&bc));
        conns.push(bc);
        inboxes.push(rx);
    }
    Farm { queue, conns, inboxes }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<BuilderRequest> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        match msg {
            Message::BuilderRequest(r) => out.push(r),
            other => panic!("unexpected {}", other.kind()),
        }
    }
    out
}

fn two_step() -> ManagerRequest {
    ManagerRequest {
        jobs: vec![
            Job::new(0, "cc", "a.o").with_args(["-c", "a.c"]).with_deps(["a.c"]),
            Job::new(1, "cc", "app").with_args(["-o", "app", "a.o"]).with_deps(["a.o"]),
        ],
        output: "app".into(),
        files: HashMap::from([("a.c".to_string(), File::new("a.c", "int main(){}"))]),
        ..Default::default()
    }
}

#[test]
fn missing_final_job_is_rejected() {
    let farm = farm(1);
    let mut request = two_step();
    request.output = "lib.so".into();
    let err = plan(&request, &SessionToken::generate(), &farm.queue).unwrap_err();
    assert_eq!(err, DispatchError::NoFinalJob("lib.so".into()));
}

#[test]
fn empty_queue_fails_synchronously() {
    let farm = farm(0);
    let err = dispatch(&two_step(), &SessionToken::generate(), &farm.queue).unwrap_err();
    assert_eq!(err, DispatchError::NoCapacity);
}

#[test]
fn unresolvable_dependency_is_rejected_before_anything_is_sent() {
    let mut farm = farm(2);
    let mut request = two_step();
    request.files.clear();
    let err = dispatch(&request, &SessionToken::generate(), &farm.queue).unwrap_err();
    assert_eq!(
        err,
        DispatchError::UnresolvedDependency { dep: "a.c".into(), job: "a.o".into() }
    );
    assert!(farm.inboxes.iter_mut().all(|rx| drain(rx).is_empty()));
    assert!(farm.conns.iter().all(|bc| bc.num_jobs() == 0));
}

#[test]
fn stray_job_with_unresolvable_input_is_rejected() {
    let farm = farm(1);
    let mut request = two_step();
    request.jobs.push(Job::new(9, "cc", "stray.o").with_deps(["nowhere.c"]));
    let err = plan(&request, &SessionToken::generate(), &farm.queue).unwrap_err();
    assert_eq!(
        err,
        DispatchError::UnresolvedDependency { dep: "nowhere.c".into(), job: "stray.o".into() }
    );
}

#[test]
fn cycles_are_rejected() {
    let farm = farm(1);
    let request = ManagerRequest {
        jobs: vec![
            Job::new(0, "cc", "a").with_deps(["b"]),
            Job::new(1, "cc", "b").with_deps(["a"]),
        ],
        output: "a".into(),
        ..Default::default()
    };
    assert!(matches!(
        plan(&request, &SessionToken::generate(), &farm.queue),
        Err(DispatchError::Cycle(_))
    ));
}

#[test]
fn single_builder_gets_every_job() {
    let mut farm = farm(1);
    let session = SessionToken::generate();
    assert_eq!(dispatch(&two_step(), &session, &farm.queue).unwrap(), 2);

    let sent = drain(&mut farm.inboxes[0]);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].build_job.output, "app");
    assert_eq!(sent[0].result_address, ResultAddress::Manager);
    assert_eq!(sent[1].result_address, ResultAddress::Peer("10.0.0.0:11222".into()));
    assert!(sent.iter().all(|r| r.session == session));
    assert_eq!(farm.conns[0].num_jobs(), 2);
}

#[test]
fn jobs_spread_over_two_builders() {
    let mut farm = farm(2);
    let session = SessionToken::generate();
    dispatch(&two_step(), &session, &farm.queue).unwrap();

    let first = drain(&mut farm.inboxes[0]);
    let second = drain(&mut farm.inboxes[1]);
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);

    let (link, compile) =
        if first[0].build_job.output == "app" { (&first[0], &second[0]) } else { (&second[0], &first[0]) };
    let link_addr = if first[0].build_job.output == "app" { "10.0.0.0:11222" } else { "10.0.0.1:11222" };

    assert_eq!(link.result_address, ResultAddress::Manager);
    assert!(link.input.is_empty());
    assert_eq!(link.wait, vec!["a.o".to_string()]);

    assert_eq!(compile.result_address, ResultAddress::Peer(link_addr.into()));
    assert_eq!(compile.input, vec![File::new("a.c", "int main(){}")]);
    assert!(compile.wait.is_empty());
}

#[test]
fn least_loaded_builder_takes_the_final_job() {
    let mut farm = farm(2);
    farm.queue.set_load(&farm.conns[0], 5);
    dispatch(&two_step(), &SessionToken::generate(), &farm.queue).unwrap();
    let on_idle = drain(&mut farm.inboxes[1]);
    assert_eq!(on_idle[0].build_job.output, "app");
}

#[test]
fn wide_graph_balances_load() {
    let farm = farm(3);
    let (jobs, files) = compile_and_link(8);
    let request = ManagerRequest { jobs, files, output: "app".into(), ..Default::default() };
    let assignments = plan(&request, &SessionToken::generate(), &farm.queue).unwrap();
    assert_eq!(assignments.len(), 9);
    assert_eq!(farm.conns.iter().map(|bc| bc.num_jobs()).sum::<usize>(), 9);
    assert!(farm.conns.iter().all(|bc| bc.num_jobs() == 3));
}

#[test]
fn send_to_vanished_builder_is_reported() {
    let mut farm = farm(1);
    farm.inboxes.clear();
    let err = dispatch(&two_step(), &SessionToken::generate(), &farm.queue).unwrap_err();
    assert_eq!(err, DispatchError::BuilderGone(BuilderId(0)));
    assert_eq!(farm.conns[0].num_jobs(), 0);
}

#[test]
fn failed_send_only_keeps_delivered_reservations() {
    let mut farm = farm(2);
    drop(farm.inboxes.remove(1));
    let (jobs, files) = compile_and_link(3);
    let request = ManagerRequest { jobs, files, output: "app".into(), ..Default::default() };

    let err = dispatch(&request, &SessionToken::generate(), &farm.queue).unwrap_err();

    assert_eq!(err, DispatchError::BuilderGone(BuilderId(1)));
    let delivered = drain(&mut farm.inboxes[0]).len();
    assert_eq!(farm.conns[0].num_jobs(), delivered);
    assert_eq!(farm.conns[1].num_jobs(), 0);
}
