// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turns a client's build request into one `BuilderRequest` per job.
//!
//! Dispatch is eager and flat: every job goes out at once, and ordering is
//! left to the builders, which hold a job until its inputs have arrived.
//! The final job is reserved first so every other job knows where to send
//! its output.

use std::collections::HashSet;
use std::sync::Arc;

use rmake_core::{BuilderId, BuilderRequest, DepTree, DepTreeError, ResultAddress, SessionToken};
use rmake_wire::ManagerRequest;
use thiserror::Error;
use tracing::{debug, info};

use crate::connection::BuilderConnection;
use crate::queue::LoadQueue;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no job produces the requested output '{0}'")]
    NoFinalJob(String),
    #[error("dependency '{dep}' of '{job}' is neither shipped nor built")]
    UnresolvedDependency { dep: String, job: String },
    #[error("dependency cycle through '{0}'")]
    Cycle(String),
    #[error("no builders available")]
    NoCapacity,
    #[error("builder {0} disconnected during dispatch")]
    BuilderGone(BuilderId),
}

impl From<DepTreeError> for DispatchError {
    fn from(e: DepTreeError) -> Self {
        match e {
            DepTreeError::NoFinalJob(output) => DispatchError::NoFinalJob(output),
            DepTreeError::Unresolved { dep, target } => {
                DispatchError::UnresolvedDependency { dep, job: target }
            }
            DepTreeError::Cycle(path) => DispatchError::Cycle(path),
        }
    }
}

/// One job bound to the builder that will run it.
#[derive(Debug)]
pub struct Assignment {
    pub builder: Arc<BuilderConnection>,
    pub request: BuilderRequest,
}

/// Check that every job's inputs can eventually be satisfied.
fn validate(request: &ManagerRequest) -> Result<DepTree, DispatchError> {
    let tree = DepTree::resolve(&request.jobs, &request.output, request.files.keys())?;

    // Jobs outside the final job's tree are still dispatched, so they must
    // resolve too.
    let outputs: HashSet<&str> = request.jobs.iter().map(|j| j.output.as_str()).collect();
    for job in &request.jobs {
        for dep in &job.deps {
            if !request.files.contains_key(dep) && !outputs.contains(dep.as_str()) {
                return Err(DispatchError::UnresolvedDependency {
                    dep: dep.clone(),
                    job: job.output.clone(),
                });
            }
        }
    }
    Ok(tree)
}

/// Validate `request` and reserve a builder for each of its jobs.
///
/// On error nothing has been reserved.
pub fn plan(
    request: &ManagerRequest,
    session: &SessionToken,
    queue: &LoadQueue,
) -> Result<Vec<Assignment>, DispatchError> {
    let final_pos = request
        .jobs
        .iter()
        .rposition(|j| j.output == request.output)
        .ok_or_else(|| DispatchError::NoFinalJob(request.output.clone()))?;
    let tree = validate(request)?;
    if queue.is_empty() {
        return Err(DispatchError::NoCapacity);
    }
    debug!(session = %session.short(8), graph = %tree, "resolved dependency tree");

    let final_job = &request.jobs[final_pos];
    let final_builder = queue.reserve().map_err(|_| DispatchError::NoCapacity)?;
    let peer = ResultAddress::Peer(final_builder.listener_addr.clone());

    let mut assignments = Vec::with_capacity(request.jobs.len());
    assignments.push(Assignment {
        request: BuilderRequest::resolve(
            final_job,
            &request.files,
            ResultAddress::Manager,
            session.clone(),
        ),
        builder: final_builder,
    });

    for (pos, job) in request.jobs.iter().enumerate() {
        if pos == final_pos {
            continue;
        }
        let builder = match queue.reserve() {
            Ok(builder) => builder,
            Err(_) => {
                // Every builder left mid-plan; hand back what was claimed.
                for a in &assignments {
                    queue.release(&a.builder);
                }
                return Err(DispatchError::NoCapacity);
            }
        };
        assignments.push(Assignment {
            request: BuilderRequest::resolve(job, &request.files, peer.clone(), session.clone()),
            builder,
        });
    }
    Ok(assignments)
}

/// Plan `request` and hand every job to its builder's writer.
///
/// Returns the number of jobs sent. If a builder has gone away, the
/// reservations of every job not yet sent are handed back.
pub fn dispatch(
    request: &ManagerRequest,
    session: &SessionToken,
    queue: &LoadQueue,
) -> Result<usize, DispatchError> {
    let assignments = plan(request, session, queue)?;
    let count = assignments.len();
    let mut pending = assignments.into_iter();
    while let Some(Assignment { builder, request: job }) = pending.next() {
        debug!(
            session = %session.short(8),
            builder = %builder.uuid,
            output = %job.build_job.output,
            result_address = %job.result_address,
            waits = job.wait.len(),
            "dispatching job",
        );
        if let Err(e) = builder.send(job) {
            // Jobs already sent finish normally; the rest never will.
            queue.release(&builder);
            for unsent in pending {
                queue.release(&unsent.builder);
            }
            return Err(DispatchError::BuilderGone(e.0));
        }
    }
    info!(session = %session.short(8), jobs = count, output = %request.output, "build dispatched");
    Ok(count)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
