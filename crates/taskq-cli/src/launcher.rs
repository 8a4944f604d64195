// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::config::WorkerProcessConfig;
use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use taskq_core::{Supervisor, Worker};
use taskq_types::WorkerConfig;
use tracing_subscriber::EnvFilter;

/// Implemented by a concrete worker class so the launcher can construct it
/// from a loaded [`WorkerProcessConfig`]. The worker class is named as the
/// type parameter of `run::<MyWorker>()`, so construction is checked at
/// compile time rather than resolved by name at runtime.
#[async_trait]
pub trait WorkerFromConfig: Worker + Sized + 'static {
    async fn from_config(config: WorkerConfig) -> Result<Self>;
}

/// CLI arguments for the thin launcher binary (§4.K, §6 "CLI/launcher").
/// Mirrors this codebase's convention of a small `*Args` struct parsed by
/// `clap` and handed a generic `run()`.
#[derive(Parser, Debug)]
#[command(name = "taskq-worker", about = "Runs a task-queue worker's supervisor loop")]
pub struct ServerArgs {
    /// Path to the worker process configuration document (YAML).
    #[arg(long, env = "TASKQ_CONFIG_PATH")]
    pub config_path: PathBuf,
}

impl ServerArgs {
    /// Installs the process's logging subscriber, loads configuration,
    /// constructs `W`, and runs its supervisor loop until a graceful stop
    /// (Ctrl-C) or a fatal error. Exit codes per §6: the caller maps `Ok(())`
    /// to 0 and `Err` to a nonzero code; a critical-tier timeout bypasses
    /// this return path entirely via `std::process::exit` inside the Killer.
    pub async fn run<W: WorkerFromConfig>(&self) -> Result<()> {
        // Installed before anything else so a ConfigError during our own
        // startup is still observable.
        init_tracing();

        let process_config = WorkerProcessConfig::load(&self.config_path)?;
        let worker = Arc::new(W::from_config(process_config.worker.clone()).await?);

        let supervisor = Supervisor::new(process_config.worker.executor_mode)
            .with_block_timeout(std::time::Duration::from_secs(process_config.block_timeout_secs));

        let stop = taskq_core::StopSignal::default();
        let stop_for_signal = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received interrupt; stopping after the in-flight batch");
                stop_for_signal.request_stop();
            }
        });

        supervisor.run(worker, stop).await?;
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
