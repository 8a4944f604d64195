// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::executor::{build_executor, Executor};
use crate::worker::Worker;
use backoff::ExponentialBackoffBuilder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskq_types::{metrics, Error, Result, StarvationPolicy};
use tracing::{debug, info, warn};

/// Bound on how long the supervisor keeps retrying a `ConnectorUnavailable`
/// fetch before giving up and propagating it as fatal. Distinct from (and
/// layered on top of) a broker driver's own internal retry budget (e.g.
/// `RedisConnector::with_retry`) — this is the outer, supervisor-level
/// backoff that applies once that inner budget is already exhausted.
const FETCH_RETRY_MAX_ELAPSED: Duration = Duration::from_secs(30);

/// Cooperative stop signal for the supervisor loop (§5 "Producer-side
/// cancellation ... is cooperative at batch boundaries"). Cloning shares the
/// same underlying flag; a launcher typically wires this to SIGINT.
#[derive(Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// The outer loop (§4.H): fetch a batch, run it, repeat, until told to stop.
/// Untouched tail tasks of a batch that was never fetched remain enqueued by
/// construction — the supervisor only pulls `tasks_per_transaction` at a
/// time and never looks ahead.
pub struct Supervisor {
    executor: Arc<dyn Executor>,
    block_timeout: Duration,
}

impl Supervisor {
    pub fn new(executor_mode: taskq_types::ExecutorMode) -> Self {
        Self {
            executor: build_executor(executor_mode),
            block_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_block_timeout(mut self, block_timeout: Duration) -> Self {
        self.block_timeout = block_timeout;
        self
    }

    /// Runs until `stop.is_stopped()` observes a graceful stop request. A
    /// batch already in flight always runs to completion before the loop
    /// re-checks the stop signal.
    pub async fn run(&self, worker: Arc<dyn Worker>, stop: StopSignal) -> Result<()> {
        worker.init_task_queue().await?;
        let config = worker.config().clone();
        let starvation = config.starvation.unwrap_or(StarvationPolicy {
            max_consecutive_empty_fetches: u32::MAX,
            backoff_seconds: 1,
        });
        let mut consecutive_empty: u32 = 0;

        while !stop.is_stopped() {
            let batch = self.fetch_with_retry(&worker, &config).await.map_err(|e| {
                warn!(worker = %config.name, reason = e.get_label(), error = %e, "batch fetch failed fatally; stopping supervisor loop");
                e
            })?;

            if batch.is_empty() {
                consecutive_empty = consecutive_empty.saturating_add(1);
                if consecutive_empty >= starvation.max_consecutive_empty_fetches {
                    debug!(
                        worker = %config.name,
                        consecutive_empty,
                        "queue starved; backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(starvation.backoff_seconds)).await;
                }
                continue;
            }
            consecutive_empty = 0;
            metrics::record_tasks_fetched(batch.len() as u64);

            info!(worker = %config.name, batch_len = batch.len(), "dispatching batch");
            self.executor.execute_tasks(Arc::clone(&worker), batch).await;
        }

        info!(worker = %config.name, "supervisor loop stopped gracefully");
        Ok(())
    }

    /// Retries a batch fetch with exponential backoff while the broker
    /// reports `ConnectorUnavailable` (SPEC_FULL §7); any other error, or
    /// `ConnectorUnavailable` persisting past `FETCH_RETRY_MAX_ELAPSED`, is
    /// propagated as fatal.
    async fn fetch_with_retry(
        &self,
        worker: &Arc<dyn Worker>,
        config: &taskq_types::WorkerConfig,
    ) -> Result<Vec<taskq_types::TaskRecord>> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_interval(Duration::from_secs(5))
            .with_max_elapsed_time(Some(FETCH_RETRY_MAX_ELAPSED))
            .build();
        backoff::future::retry(policy, || async {
            worker
                .queue()
                .get_next_tasks(&config.name, config.tasks_per_transaction, self.block_timeout)
                .await
                .map_err(|e| match e {
                    Error::ConnectorUnavailable(_) => {
                        metrics::record_connector_retry();
                        warn!(worker = %config.name, error = %e, "batch fetch unavailable; retrying with backoff");
                        backoff::Error::transient(e)
                    },
                    other => backoff::Error::permanent(other),
                })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::killer::CancellationToken;
    use crate::queue::TaskQueue;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use taskq_broker::{Connector, InMemoryConnector};
    use taskq_types::{ConnectorDescriptor, ExecutorMode, Kwargs, TaskRecord, WorkResult};

    /// Wraps an [`InMemoryConnector`] and fails `pop_bulk` with
    /// `ConnectorUnavailable` a fixed number of times before delegating, so
    /// `fetch_with_retry`'s retry-with-backoff behavior can be exercised
    /// without a live Redis instance.
    struct FlakyConnector {
        inner: InMemoryConnector,
        remaining_failures: StdMutex<u32>,
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn push_bulk(&self, queue_name: &str, items: Vec<Vec<u8>>) -> taskq_types::Result<()> {
            self.inner.push_bulk(queue_name, items).await
        }

        async fn pop_bulk(
            &self,
            queue_name: &str,
            n: usize,
            block_timeout: Duration,
        ) -> taskq_types::Result<Vec<Vec<u8>>> {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(taskq_types::Error::ConnectorUnavailable(
                    "simulated transient outage".to_string(),
                ));
            }
            drop(remaining);
            self.inner.pop_bulk(queue_name, n, block_timeout).await
        }

        async fn length(&self, queue_name: &str) -> taskq_types::Result<u64> {
            self.inner.length(queue_name).await
        }

        async fn purge(&self, queue_name: &str) -> taskq_types::Result<u64> {
            self.inner.purge(queue_name).await
        }
    }

    struct CountingWorker {
        config: taskq_types::WorkerConfig,
        queue: TaskQueue,
        successes: Arc<StdMutex<u32>>,
    }

    #[async_trait]
    impl Worker for CountingWorker {
        fn config(&self) -> &taskq_types::WorkerConfig {
            &self.config
        }

        fn queue(&self) -> &TaskQueue {
            &self.queue
        }

        async fn work(&self, _task: &TaskRecord, _token: CancellationToken) -> WorkResult {
            Ok(serde_json::json!(null))
        }

        async fn on_success(&self, _task: &TaskRecord, _value: &serde_json::Value) {
            *self.successes.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn drains_a_queue_then_stops_gracefully() {
        let connector = Arc::new(InMemoryConnector::new());
        let queue = TaskQueue::new(connector);
        for _ in 0..10 {
            queue.apply_async_one("greet", Kwargs::new()).await.unwrap();
        }
        let config = taskq_types::WorkerConfig::builder("greet", ConnectorDescriptor::redis("redis://localhost"))
            .tasks_per_transaction(3)
            .starvation(StarvationPolicy {
                max_consecutive_empty_fetches: 1,
                backoff_seconds: 0,
            })
            .build()
            .unwrap();
        let successes = Arc::new(StdMutex::new(0));
        let worker = Arc::new(CountingWorker {
            config,
            queue: queue.clone(),
            successes: successes.clone(),
        });

        let supervisor = Supervisor::new(ExecutorMode::Serial).with_block_timeout(Duration::from_millis(10));
        let stop = StopSignal::default();
        let stop_clone = stop.clone();
        let worker_clone = worker.clone();
        let handle = tokio::spawn(async move { supervisor.run(worker_clone, stop_clone).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.request_stop();
        handle.await.unwrap().unwrap();

        assert_eq!(*successes.lock().unwrap(), 10);
        assert_eq!(queue.number_of_enqueued_tasks("greet").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transient_connector_unavailable_is_retried_rather_than_fatal() {
        let connector = Arc::new(FlakyConnector {
            inner: InMemoryConnector::new(),
            remaining_failures: StdMutex::new(3),
        });
        let queue = TaskQueue::new(connector.clone());
        queue.apply_async_one("greet", Kwargs::new()).await.unwrap();

        let config = taskq_types::WorkerConfig::builder("greet", ConnectorDescriptor::redis("redis://localhost"))
            .tasks_per_transaction(1)
            .starvation(StarvationPolicy {
                max_consecutive_empty_fetches: 1,
                backoff_seconds: 0,
            })
            .build()
            .unwrap();
        let successes = Arc::new(StdMutex::new(0));
        let worker = Arc::new(CountingWorker {
            config,
            queue: queue.clone(),
            successes: successes.clone(),
        });

        let before = metrics::connector_retries();
        let supervisor = Supervisor::new(ExecutorMode::Serial).with_block_timeout(Duration::from_millis(10));
        let stop = StopSignal::default();
        let stop_clone = stop.clone();
        let worker_clone = worker.clone();
        let handle = tokio::spawn(async move { supervisor.run(worker_clone, stop_clone).await });

        tokio::time::sleep(Duration::from_millis(1200)).await;
        stop.request_stop();
        handle.await.unwrap().unwrap();

        assert_eq!(*successes.lock().unwrap(), 1);
        assert!(metrics::connector_retries() - before >= 3);
    }
}
