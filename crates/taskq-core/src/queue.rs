// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;
use taskq_broker::Connector;
use taskq_types::{codec, Kwargs, Result, TaskRecord};

/// Thin façade over a [`Connector`] that namespaces every operation by
/// `task_name`. This is the only type producer code touches to enqueue work;
/// the executor side consumes through the same façade via
/// [`TaskQueue::get_next_tasks`].
#[derive(Clone)]
pub struct TaskQueue {
    connector: Arc<dyn Connector>,
}

impl TaskQueue {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    fn now_millis() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Enqueues one task under `name`. Two calls enqueue two tasks; there is
    /// no deduplication.
    pub async fn apply_async_one(&self, name: &str, kwargs: Kwargs) -> Result<()> {
        let task = TaskRecord::new(name, kwargs, Self::now_millis());
        let bytes = codec::encode(&task)?;
        self.connector.push_bulk(name, vec![bytes]).await
    }

    /// Enqueues every item in `kwargs_list` under `name`, in order, as a
    /// single broker round trip.
    pub async fn apply_async_many(&self, name: &str, kwargs_list: Vec<Kwargs>) -> Result<()> {
        let now = Self::now_millis();
        let mut encoded = Vec::with_capacity(kwargs_list.len());
        for kwargs in kwargs_list {
            encoded.push(codec::encode(&TaskRecord::new(name, kwargs, now))?);
        }
        self.connector.push_bulk(name, encoded).await
    }

    /// Pushes an already-constructed record back onto its own queue, used by
    /// the executor to commit a retry or requeue outcome.
    pub async fn re_enqueue(&self, task: &TaskRecord) -> Result<()> {
        let bytes = codec::encode(task)?;
        self.connector.push_bulk(&task.name, vec![bytes]).await
    }

    /// Pops and decodes up to `n` tasks from `name`, blocking up to
    /// `block_timeout` for the first one. Consuming fewer than `n` leaves the
    /// remainder enqueued; a corrupt record rejects the whole batch rather
    /// than silently skipping it (§7).
    pub async fn get_next_tasks(
        &self,
        name: &str,
        n: usize,
        block_timeout: Duration,
    ) -> Result<Vec<TaskRecord>> {
        let raw = self.connector.pop_bulk(name, n, block_timeout).await?;
        raw.iter().map(|bytes| codec::decode(bytes)).collect()
    }

    pub async fn number_of_enqueued_tasks(&self, name: &str) -> Result<u64> {
        self.connector.length(name).await
    }

    pub async fn purge_tasks(&self, name: &str) -> Result<u64> {
        self.connector.purge(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskq_broker::InMemoryConnector;

    fn queue() -> TaskQueue {
        TaskQueue::new(Arc::new(InMemoryConnector::new()))
    }

    #[tokio::test]
    async fn apply_async_one_increments_length_by_one() {
        let q = queue();
        q.apply_async_one("greet", Kwargs::new()).await.unwrap();
        assert_eq!(q.number_of_enqueued_tasks("greet").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn apply_async_many_increments_length_by_n() {
        let q = queue();
        q.apply_async_many("greet", vec![Kwargs::new(), Kwargs::new(), Kwargs::new()])
            .await
            .unwrap();
        assert_eq!(q.number_of_enqueued_tasks("greet").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn purge_zeroes_the_queue_and_is_a_noop_when_absent() {
        let q = queue();
        q.apply_async_one("greet", Kwargs::new()).await.unwrap();
        assert_eq!(q.purge_tasks("greet").await.unwrap(), 1);
        assert_eq!(q.number_of_enqueued_tasks("greet").await.unwrap(), 0);
        assert_eq!(q.purge_tasks("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_next_tasks_removes_exactly_min_k_length_in_order() {
        let q = queue();
        q.apply_async_many(
            "greet",
            vec![kw("a"), kw("b"), kw("c")],
        )
        .await
        .unwrap();
        let got = q
            .get_next_tasks("greet", 2, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].kwargs.get("tag").unwrap(), &serde_json::json!("a"));
        assert_eq!(got[1].kwargs.get("tag").unwrap(), &serde_json::json!("b"));
        assert_eq!(q.number_of_enqueued_tasks("greet").await.unwrap(), 1);
    }

    fn kw(tag: &str) -> Kwargs {
        let mut m = Kwargs::new();
        m.insert("tag".to_string(), serde_json::json!(tag));
        m
    }
}
