// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The unit of work dispatched to a builder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{File, Job, SessionToken};

/// Where a builder sends the output of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultAddress {
    /// Keep the output local
    None,
    /// Return the output to the manager as a `BuilderResult`
    Manager,
    /// Forward the output to another builder's listener
    Peer(String),
}

crate::simple_display! {
    ResultAddress {
        None => "none",
        Manager => "manager",
        Peer(..) => "peer",
    }
}

/// A job plus everything a builder needs to run it.
///
/// `input` and `wait` partition `build_job.deps`: files already available
/// are shipped inline, the rest arrive later from peer builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderRequest {
    pub build_job: Job,
    #[serde(default)]
    pub input: Vec<File>,
    #[serde(default)]
    pub wait: Vec<String>,
    pub result_address: ResultAddress,
    pub session: SessionToken,
}

impl BuilderRequest {
    /// Build a request for `job`, splitting its dependencies into shipped
    /// files and files to wait for.
    pub fn resolve(
        job: &Job,
        available: &HashMap<String, File>,
        result_address: ResultAddress,
        session: SessionToken,
    ) -> Self {
        let mut input = Vec::new();
        let mut wait = Vec::new();
        for dep in &job.deps {
            match available.get(dep) {
                Some(file) => input.push(file.clone()),
                None => wait.push(dep.clone()),
            }
        }
        Self { build_job: job.clone(), input, wait, result_address, session }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
