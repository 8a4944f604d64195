// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::killer::CancellationToken;
use crate::queue::TaskQueue;
use async_trait::async_trait;
use taskq_types::{Kwargs, Outcome, Result, TaskRecord, TimeoutTier, WorkResult, WorkerConfig};

/// A runnable worker class (§4.G, §6 "Worker module contract"). Implementors
/// provide `config()`, `queue()` and `work()`; every hook has a no-op
/// default, so a worker only overrides the lifecycle points it cares about.
#[async_trait]
pub trait Worker: Send + Sync {
    fn config(&self) -> &WorkerConfig;
    fn queue(&self) -> &TaskQueue;

    /// The only method without a default. Receives a cooperative
    /// cancellation token so long-running work can check for a fired soft
    /// timeout at its own checkpoints (§5 "Cancellation").
    async fn work(&self, task: &TaskRecord, cancellation: CancellationToken) -> WorkResult;

    /// Runs once before `work()`. A failure here is logged and swallowed;
    /// `work()` still runs regardless (see DESIGN.md for why this is
    /// preserved as-is rather than made configurable).
    async fn pre_work(&self, _task: &TaskRecord) -> Result<()> {
        Ok(())
    }

    /// Runs once after `work()`, before the terminal hook. A failure here is
    /// logged and swallowed.
    async fn post_work(&self, _task: &TaskRecord, _outcome: &Outcome) -> Result<()> {
        Ok(())
    }

    /// Runs once before the supervisor loop starts; the default is a no-op,
    /// but workers that need to pre-create queues or warm a connection
    /// override it.
    async fn init_task_queue(&self) -> Result<()> {
        Ok(())
    }

    async fn on_success(&self, _task: &TaskRecord, _value: &serde_json::Value) {}
    async fn on_retry(&self, _task: &TaskRecord) {}
    async fn on_max_retries(&self, _task: &TaskRecord) {}
    async fn on_requeue(&self, _task: &TaskRecord) {}
    async fn on_timeout(&self, _task: &TaskRecord, _tier: TimeoutTier) {}
    async fn on_failure(&self, _task: &TaskRecord, _error: &str) {}

    /// Enqueues one task of this worker's own class.
    async fn apply_async_one(&self, kwargs: Kwargs) -> Result<()> {
        self.queue()
            .apply_async_one(&self.config().name, kwargs)
            .await
    }

    /// Enqueues many tasks of this worker's own class in one round trip.
    async fn apply_async_many(&self, kwargs_list: Vec<Kwargs>) -> Result<()> {
        self.queue()
            .apply_async_many(&self.config().name, kwargs_list)
            .await
    }

    async fn number_of_enqueued_tasks(&self) -> Result<u64> {
        self.queue()
            .number_of_enqueued_tasks(&self.config().name)
            .await
    }

    async fn purge_tasks(&self) -> Result<u64> {
        self.queue().purge_tasks(&self.config().name).await
    }
}
