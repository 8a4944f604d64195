// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::killer::Killer;
use crate::worker::Worker;
use async_trait::async_trait;
use futures::future;
use std::sync::Arc;
use taskq_types::{classify, metrics, ExecutorMode, Outcome, TaskRecord, TimeoutTier, Timeouts};
use tracing::{info, warn};

/// Shared interface the two executor strategies satisfy (§4.F).
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute_tasks(&self, worker: Arc<dyn Worker>, tasks: Vec<TaskRecord>);
}

/// Builds the executor configured by a `WorkerConfig`'s `executor_mode`.
pub fn build_executor(mode: ExecutorMode) -> Arc<dyn Executor> {
    match mode {
        ExecutorMode::Serial => Arc::new(SerialExecutor),
        ExecutorMode::Threaded { number_of_threads } => {
            Arc::new(ThreadedExecutor { number_of_threads })
        },
    }
}

/// Per-task pipeline (§4.F steps 1-6, minus the outcome's broker/hook
/// dispatch which `commit_outcome` performs separately so callers can choose
/// to do it inline (serial) or on a dedicated committer (threaded)). Takes
/// `Arc<dyn Worker>` (rather than `&dyn Worker`) because `work()` must run
/// inside a detached `tokio::spawn` so the Killer's hard tier can
/// `AbortHandle::abort()` it irrespective of what `work()` itself is doing.
async fn execute_one(worker: Arc<dyn Worker>, task: TaskRecord) -> (TaskRecord, Outcome) {
    if let Err(e) = worker.pre_work(&task).await {
        warn!(task = %task.name, error = %e, "pre_work failed; continuing into work()");
    }

    let timeouts = worker.config().timeouts;
    let use_killer = timeouts != Timeouts::disabled();
    let killer = use_killer.then(|| Arc::new(Killer::new(timeouts)));
    let token = killer.as_ref().map(|k| k.token()).unwrap_or_default();

    let run_count = task.run_count;
    let max_retries = worker.config().max_retries;

    let spawned = {
        let worker = Arc::clone(&worker);
        let task = task.clone();
        let token = token.clone();
        tokio::spawn(async move { worker.work(&task, token).await })
    };

    if let Some(killer) = &killer {
        killer.arm(spawned.abort_handle());
    }

    let join_result = spawned.await;

    // Snapshot which tier (if any) fired before tearing the Killer down;
    // `terminate()` below moves it to `Dead`, so the tier flags must be read
    // first. Hard takes precedence over soft: a hard firing that didn't
    // actually manage to cancel the task (the non-yielding case) must still
    // be reported as a hard timeout, not silently downgraded to soft.
    let tier_fired = killer.as_ref().and_then(|k| {
        if k.hard_fired() {
            Some(TimeoutTier::Hard)
        } else if k.soft_fired() {
            Some(TimeoutTier::Soft)
        } else {
            None
        }
    });

    if let Some(killer) = &killer {
        killer.terminate().await;
    }

    let outcome = match join_result {
        Err(join_error) if join_error.is_cancelled() => Outcome::Timeout(TimeoutTier::Hard),
        Err(join_error) => Outcome::Failure(format!("work() panicked: {join_error}")),
        Ok(work_result) => {
            if let Some(tier) = tier_fired {
                Outcome::Timeout(tier)
            } else {
                classify(work_result, run_count, max_retries)
            }
        },
    };

    if let Err(e) = worker.post_work(&task, &outcome).await {
        warn!(task = %task.name, error = %e, "post_work failed; continuing to outcome dispatch");
    }

    (task, outcome)
}

/// Re-enqueues the task if the outcome calls for it and fires exactly one
/// terminal hook. Shared by both executor variants so the outcome table in
/// §4.F has a single implementation.
async fn commit_outcome(worker: &dyn Worker, task: TaskRecord, outcome: Outcome) {
    metrics::record_outcome(outcome.label());
    match &outcome {
        Outcome::Success(value) => {
            info!(task = %task.name, "task succeeded");
            worker.on_success(&task, value).await;
        },
        Outcome::Retry => {
            let retried = task.for_retry();
            if let Err(e) = worker.queue().re_enqueue(&retried).await {
                warn!(task = %task.name, error = %e, "failed to re-enqueue retry");
            }
            worker.on_retry(&task).await;
        },
        Outcome::Requeue => {
            let requeued = task.for_requeue();
            if let Err(e) = worker.queue().re_enqueue(&requeued).await {
                warn!(task = %task.name, error = %e, "failed to re-enqueue requeue");
            }
            worker.on_requeue(&task).await;
        },
        Outcome::MaxRetries => {
            warn!(task = %task.name, run_count = task.run_count, "max retries exceeded");
            worker.on_max_retries(&task).await;
        },
        Outcome::Timeout(tier) => {
            warn!(task = %task.name, tier = %tier, "task timed out");
            worker.on_timeout(&task, *tier).await;
        },
        Outcome::Failure(error) => {
            warn!(task = %task.name, error, "task failed");
            worker.on_failure(&task, error).await;
        },
    }
}

/// Processes tasks one at a time on the calling context (§4.F "Serial
/// executor").
pub struct SerialExecutor;

#[async_trait]
impl Executor for SerialExecutor {
    async fn execute_tasks(&self, worker: Arc<dyn Worker>, tasks: Vec<TaskRecord>) {
        for task in tasks {
            let (task, outcome) = execute_one(Arc::clone(&worker), task).await;
            commit_outcome(worker.as_ref(), task, outcome).await;
        }
    }
}

/// Runs up to `number_of_threads` tasks concurrently from the same batch
/// (§4.F "Threaded executor"). There is no ordering guarantee between tasks
/// within a batch; the batch completes once every task has committed an
/// outcome.
pub struct ThreadedExecutor {
    number_of_threads: usize,
}

#[async_trait]
impl Executor for ThreadedExecutor {
    async fn execute_tasks(&self, worker: Arc<dyn Worker>, tasks: Vec<TaskRecord>) {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.number_of_threads.max(1)));
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let worker = Arc::clone(&worker);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed unexpectedly");
                let (task, outcome) = execute_one(Arc::clone(&worker), task).await;
                commit_outcome(worker.as_ref(), task, outcome).await;
            }));
        }
        for result in future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "threaded executor task committer panicked");
            }
        }
    }
}
