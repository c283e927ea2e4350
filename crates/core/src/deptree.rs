// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency tree for a build request.
//!
//! Resolves every dependency reachable from the final job to either a
//! shipped file or another job's output. A request that fails to resolve
//! would leave some builder waiting for a file nobody produces.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::Job;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DepTreeError {
    #[error("no job produces the requested output '{0}'")]
    NoFinalJob(String),

    #[error("could not resolve dependency '{dep}' for '{target}'")]
    Unresolved { dep: String, target: String },

    #[error("dependency cycle through '{0}'")]
    Cycle(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    /// Produced by a job in the request
    Build,
    /// Shipped by the client
    File,
}

/// A resolved node: the path it yields and what it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepTree {
    pub result: String,
    pub kind: DepKind,
    pub depends_on: Vec<DepTree>,
}

impl DepTree {
    /// Resolve the tree rooted at the job producing `output`.
    ///
    /// Shipped files take precedence over a job producing the same path,
    /// matching how requests partition inputs.
    pub fn resolve<'a, I>(jobs: &[Job], output: &str, files: I) -> Result<Self, DepTreeError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let by_output: HashMap<&str, &Job> =
            jobs.iter().map(|j| (j.output.as_str(), j)).collect();
        let files: HashSet<&str> = files.into_iter().map(String::as_str).collect();
        let root = by_output
            .get(output)
            .copied()
            .ok_or_else(|| DepTreeError::NoFinalJob(output.to_string()))?;

        let mut resolver = Resolver { by_output, files, visiting: HashSet::new() };
        resolver.build(root)
    }

    /// Number of distinct job nodes in the tree, the root included.
    pub fn job_count(&self) -> usize {
        let mut seen = HashSet::new();
        self.collect_jobs(&mut seen);
        seen.len()
    }

    fn collect_jobs<'a>(&'a self, seen: &mut HashSet<&'a str>) {
        if self.kind == DepKind::Build {
            seen.insert(&self.result);
        }
        for dep in &self.depends_on {
            dep.collect_jobs(seen);
        }
    }

    fn fmt_depth(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        let kind = match self.kind {
            DepKind::Build => "build",
            DepKind::File => "file",
        };
        writeln!(f, "{:indent$}{} ({})", "", self.result, kind, indent = depth * 2)?;
        for dep in &self.depends_on {
            dep.fmt_depth(f, depth + 1)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for DepTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_depth(f, 0)
    }
}

struct Resolver<'a> {
    by_output: HashMap<&'a str, &'a Job>,
    files: HashSet<&'a str>,
    visiting: HashSet<&'a str>,
}

impl<'a> Resolver<'a> {
    fn build(&mut self, job: &'a Job) -> Result<DepTree, DepTreeError> {
        if !self.visiting.insert(job.output.as_str()) {
            return Err(DepTreeError::Cycle(job.output.clone()));
        }

        let mut depends_on = Vec::with_capacity(job.deps.len());
        for dep in &job.deps {
            if self.files.contains(dep.as_str()) {
                depends_on.push(DepTree {
                    result: dep.clone(),
                    kind: DepKind::File,
                    depends_on: Vec::new(),
                });
                continue;
            }
            match self.by_output.get(dep.as_str()).copied() {
                Some(producer) => depends_on.push(self.build(producer)?),
                None => {
                    return Err(DepTreeError::Unresolved {
                        dep: dep.clone(),
                        target: job.output.clone(),
                    })
                }
            }
        }

        self.visiting.remove(job.output.as_str());
        Ok(DepTree { result: job.output.clone(), kind: DepKind::Build, depends_on })
    }
}

#[cfg(test)]
#[path = "deptree_tests.rs"]
mod tests;
