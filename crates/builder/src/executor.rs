// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running build commands.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// What a finished command produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    /// stdout followed by stderr
    pub output: String,
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Failure description, empty on success.
    pub fn error(&self) -> String {
        match self.exit_code {
            Some(0) => String::new(),
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Adapter for running a job's command
#[async_trait]
pub trait Executor: Clone + Send + Sync + 'static {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        dir: &Path,
        env: &[(String, String)],
    ) -> Result<ExecOutput, ExecError>;
}

/// Runs commands as child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl Executor for ProcessExecutor {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        dir: &Path,
        env: &[(String, String)],
    ) -> Result<ExecOutput, ExecError> {
        let out = Command::new(command)
            .args(args)
            .current_dir(dir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecError::Spawn { command: command.to_string(), source })?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(ExecOutput { output, exit_code: out.status.code() })
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ExecError, ExecOutput, Executor};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Recorded command invocation
    #[derive(Debug, Clone)]
    pub struct ExecCall {
        pub command: String,
        pub args: Vec<String>,
        pub dir: PathBuf,
    }

    #[derive(Debug, Clone, Default)]
    struct Script {
        output: ExecOutput,
        writes: Vec<(String, Vec<u8>)>,
        spawn_error: bool,
    }

    #[derive(Default)]
    struct FakeExecutorState {
        calls: Vec<ExecCall>,
        scripts: HashMap<String, Script>,
    }

    /// Fake executor for testing.
    ///
    /// Unscripted commands succeed with no output. Scripted commands can
    /// write files into the working directory, as a compiler would.
    #[derive(Clone, Default)]
    pub struct FakeExecutor {
        inner: Arc<Mutex<FakeExecutorState>>,
    }

    impl FakeExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        fn update(&self, command: &str, f: impl FnOnce(&mut Script)) {
            let mut inner = self.inner.lock();
            let script = inner.scripts.entry(command.to_string()).or_insert_with(|| Script {
                output: ExecOutput { output: String::new(), exit_code: Some(0) },
                ..Script::default()
            });
            f(script);
        }

        /// Make `command` print `output` and exit with `exit_code`.
        pub fn respond(&self, command: &str, output: &str, exit_code: i32) {
            let output = ExecOutput { output: output.to_string(), exit_code: Some(exit_code) };
            self.update(command, |s| s.output = output);
        }

        /// Make `command` create `path` in its working directory.
        pub fn writes(&self, command: &str, path: &str, contents: impl Into<Vec<u8>>) {
            let entry = (path.to_string(), contents.into());
            self.update(command, |s| s.writes.push(entry));
        }

        /// Make `command` fail to start.
        pub fn fail_spawn(&self, command: &str) {
            self.update(command, |s| s.spawn_error = true);
        }

        /// Get all recorded invocations
        pub fn calls(&self) -> Vec<ExecCall> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn run(
            &self,
            command: &str,
            args: &[String],
            dir: &Path,
            _env: &[(String, String)],
        ) -> Result<ExecOutput, ExecError> {
            let script = {
                let mut inner = self.inner.lock();
                inner.calls.push(ExecCall {
                    command: command.to_string(),
                    args: args.to_vec(),
                    dir: dir.to_path_buf(),
                });
                inner.scripts.get(command).cloned()
            };
            let Some(script) = script else {
                return Ok(ExecOutput { output: String::new(), exit_code: Some(0) });
            };
            if script.spawn_error {
                return Err(ExecError::Spawn {
                    command: command.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            for (path, contents) in &script.writes {
                let dest = dir.join(path);
                tokio::fs::write(&dest, contents).await.map_err(|source| ExecError::Spawn {
                    command: command.to_string(),
                    source,
                })?;
            }
            Ok(script.output)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{ExecCall, FakeExecutor};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
