// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rmake-builder: registers with a manager and runs the jobs it dispatches.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rmake_builder::{BuilderNode, Config};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rmake-builder")]
#[command(version)]
#[command(about = "Build farm worker: runs compile and link jobs for an rmake manager")]
struct Args {
    /// Manager address (overrides RMAKE_MANAGER_ADDR)
    #[arg(long)]
    manager: Option<String>,

    /// Peer listener bind address (overrides RMAKE_BUILDER_LISTEN)
    #[arg(long)]
    listen: Option<String>,

    /// Address announced to the manager (overrides RMAKE_BUILDER_ADVERTISE)
    #[arg(long)]
    advertise: Option<String>,

    /// Number of concurrent jobs (overrides RMAKE_PROCS)
    #[arg(long)]
    procs: Option<usize>,

    /// Directory holding per-session build trees (overrides RMAKE_BUILD_ROOT)
    #[arg(long)]
    build_root: Option<PathBuf>,

    /// Extra environment for every job, as KEY=VALUE
    #[arg(long = "env", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = rmake_core::logging::init(args.log_file.as_deref()).context("initializing logging")?;

    let mut config = Config::load();
    if let Some(manager) = args.manager {
        config.manager_addr = manager;
    }
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if args.advertise.is_some() {
        config.advertise_addr = args.advertise;
    }
    if let Some(procs) = args.procs {
        config.procs = procs.max(1);
    }
    if let Some(root) = args.build_root {
        config.build_root = root;
    }
    config.env = args.env;

    let node = BuilderNode::bind(config).await?;
    info!(listener = %node.listener_addr(), version = env!("CARGO_PKG_VERSION"), "rmake-builder bound");

    tokio::select! {
        res = node.run() => res.context("builder stopped")?,
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}
