// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: spin up a manager and builders on loopback.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

pub use rmake_builder::BuilderNode;
pub use rmake_client::ManagerClient;
pub use rmake_core::{BuilderId, File, Job, SessionToken, PROTOCOL_VERSION};
pub use rmake_manager::{Manager, ManagerCtx};
pub use rmake_wire::{
    read_message, write_message, BuilderAnnouncement, ManagerRequest, Message,
};
pub use similar_asserts::assert_eq;
pub use std::collections::HashMap;
pub use std::path::PathBuf;

/// Upper bound for anything a spec waits on.
pub const SPEC_WAIT: Duration = Duration::from_secs(10);

/// Poll `check` until it holds or `SPEC_WAIT` runs out.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + SPEC_WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held within {SPEC_WAIT:?}");
}

/// One running builder and the directory it builds in.
pub struct Worker {
    pub listener_addr: String,
    pub build_root: PathBuf,
    task: JoinHandle<Result<(), rmake_builder::BuilderError>>,
}

impl Worker {
    pub fn session_file(&self, session: &SessionToken, path: &str) -> PathBuf {
        self.build_root.join(session.as_str()).join(path)
    }
}

/// A manager plus any number of builders.
pub struct Farm {
    pub addr: String,
    pub ctx: Arc<ManagerCtx>,
    pub workers: Vec<Worker>,
    dir: TempDir,
    manager: JoinHandle<()>,
}

impl Farm {
    pub async fn start() -> Self {
        let config = rmake_manager::Config {
            listen_addr: "127.0.0.1:0".to_string(),
            ipc_timeout: Duration::from_secs(5),
        };
        let manager = Manager::bind(&config).await.unwrap();
        let addr = manager.local_addr().unwrap().to_string();
        let ctx = manager.ctx();
        let manager = tokio::spawn(manager.run());
        Self { addr, ctx, workers: Vec::new(), dir: tempfile::tempdir().unwrap(), manager }
    }

    /// Start `n` more builders and wait until the manager has queued them.
    pub async fn with_builders(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.add_builder().await;
        }
        self
    }

    pub async fn add_builder(&mut self) -> &Worker {
        let build_root = self.dir.path().join(format!("builder-{}", self.workers.len()));
        let config = rmake_builder::Config {
            manager_addr: self.addr.clone(),
            listen_addr: "127.0.0.1:0".to_string(),
            advertise_addr: None,
            procs: 2,
            build_root: build_root.clone(),
            status_interval: Duration::from_secs(60),
            ipc_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_millis(50),
            reconnect_attempts: 0,
            queue_capacity: None,
            env: Vec::new(),
        };
        let node = BuilderNode::bind(config).await.unwrap();
        let listener_addr = node.listener_addr().to_string();
        let task = tokio::spawn(node.run());

        let expected = self.workers.len() + 1;
        let ctx = Arc::clone(&self.ctx);
        eventually(|| ctx.queue.len() == expected).await;

        self.workers.push(Worker { listener_addr, build_root, task });
        &self.workers[self.workers.len() - 1]
    }

    pub fn client(&self) -> ManagerClient {
        ManagerClient::new(self.addr.clone())
    }
}

impl Drop for Farm {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.task.abort();
        }
        self.manager.abort();
    }
}

/// `sh -c <script>` producing `output`.
pub fn shell_job(id: u32, output: &str, deps: &[&str], script: &str) -> Job {
    Job::new(id, "sh", output).with_args(["-c", script]).with_deps(deps.iter().copied())
}

pub fn build_of(output: &str, jobs: Vec<Job>) -> ManagerRequest {
    ManagerRequest { jobs, output: output.to_string(), ..Default::default() }
}
