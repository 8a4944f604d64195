// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Example launcher binary. Real deployments implement their own
//! [`WorkerFromConfig`] worker and point a config file at its connector; this
//! one wires up an `EchoWorker` that logs each task's kwargs and succeeds, so
//! the launcher itself can be smoke-tested end to end against a real broker.

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use taskq_cli::{ServerArgs, WorkerFromConfig};
use taskq_core::{CancellationToken, TaskQueue, Worker};
use taskq_types::{TaskRecord, WorkResult, WorkerConfig};

struct EchoWorker {
    config: WorkerConfig,
    queue: TaskQueue,
}

#[async_trait]
impl WorkerFromConfig for EchoWorker {
    async fn from_config(config: WorkerConfig) -> Result<Self> {
        let connector = taskq_broker::connect(&config.connector).await?;
        Ok(Self {
            queue: TaskQueue::new(connector),
            config,
        })
    }
}

#[async_trait]
impl Worker for EchoWorker {
    fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    async fn work(&self, task: &TaskRecord, _cancellation: CancellationToken) -> WorkResult {
        tracing::info!(task = %task.name, kwargs = ?task.kwargs, "echo");
        Ok(serde_json::json!({ "echoed": task.kwargs }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    if let Err(e) = args.run::<EchoWorker>().await {
        tracing::error!(error = %e, "worker exited with an error");
        std::process::exit(1);
    }
    Ok(())
}
