// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rmake-manager: accepts builders and dispatches client builds to them.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rmake_manager::{Config, Manager};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rmake-manager")]
#[command(version)]
#[command(about = "Build farm manager: schedules build jobs onto connected builders")]
struct Args {
    /// Address to listen on (overrides RMAKE_MANAGER_LISTEN)
    #[arg(long)]
    listen: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = rmake_core::logging::init(args.log_file.as_deref()).context("initializing logging")?;

    let mut config = Config::load();
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    let manager = Manager::bind(&config).await?;
    info!(addr = %manager.local_addr()?, version = env!("CARGO_PKG_VERSION"), "rmake-manager starting");

    tokio::select! {
        _ = manager.run() => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}
