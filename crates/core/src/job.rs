// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build jobs: one compile or link step.

use serde::{Deserialize, Serialize};

/// A single unit of build work.
///
/// `output` is the path (relative to the build directory) this job produces,
/// `deps` are the paths it consumes. Jobs are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub output: String,
    #[serde(default)]
    pub deps: Vec<String>,
    /// Unique within a build
    #[serde(default)]
    pub id: u32,
}

impl Job {
    pub fn new(id: u32, command: impl Into<String>, output: impl Into<String>) -> Self {
        Self { command: command.into(), args: Vec::new(), output: output.into(), deps: Vec::new(), id }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Command line for log output.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Find the job producing the build's requested artifact.
///
/// When several jobs claim the same output the last one wins.
pub fn find_final_job<'a>(jobs: &'a [Job], output: &str) -> Option<&'a Job> {
    jobs.iter().rev().find(|j| j.output == output)
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
