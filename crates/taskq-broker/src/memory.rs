// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::connector::Connector;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use taskq_types::Result;
use tokio::sync::Notify;

/// In-process [`Connector`] backed by `VecDeque`s behind a mutex, used by the
/// executor and supervisor test suites so they don't need a live Redis
/// instance. Blocking `pop_bulk` is implemented with a [`Notify`] rather than
/// polling, so a `push_bulk` that wakes a waiting pop resolves immediately.
#[derive(Default)]
pub struct InMemoryConnector {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    notify: Notify,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn push_bulk(&self, queue_name: &str, items: Vec<Vec<u8>>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        {
            let mut queues = self.queues.lock().unwrap();
            let queue = queues.entry(queue_name.to_string()).or_default();
            queue.extend(items);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn pop_bulk(
        &self,
        queue_name: &str,
        n: usize,
        block_timeout: Duration,
    ) -> Result<Vec<Vec<u8>>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let deadline = tokio::time::Instant::now() + block_timeout;
        loop {
            {
                let mut queues = self.queues.lock().unwrap();
                if let Some(queue) = queues.get_mut(queue_name) {
                    if !queue.is_empty() {
                        let mut out = Vec::with_capacity(n);
                        while out.len() < n {
                            match queue.pop_front() {
                                Some(item) => out.push(item),
                                None => break,
                            }
                        }
                        return Ok(out);
                    }
                }
            }
            if block_timeout.is_zero() {
                return Ok(Vec::new());
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            let notified = self.notify.notified();
            tokio::select! {
                _ = notified => {},
                _ = tokio::time::sleep(remaining) => return Ok(Vec::new()),
            }
        }
    }

    async fn length(&self, queue_name: &str) -> Result<u64> {
        let queues = self.queues.lock().unwrap();
        Ok(queues.get(queue_name).map_or(0, |q| q.len() as u64))
    }

    async fn purge(&self, queue_name: &str) -> Result<u64> {
        let mut queues = self.queues.lock().unwrap();
        Ok(queues.remove(queue_name).map_or(0, |q| q.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_then_pop_preserves_fifo_order() {
        let connector = InMemoryConnector::new();
        connector
            .push_bulk("q", vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .await
            .unwrap();
        assert_eq!(connector.length("q").await.unwrap(), 3);
        let popped = connector
            .pop_bulk("q", 2, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(popped, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(connector.length("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn purge_on_empty_queue_is_a_noop() {
        let connector = InMemoryConnector::new();
        assert_eq!(connector.purge("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pop_bulk_blocks_until_a_push_wakes_it() {
        let connector = std::sync::Arc::new(InMemoryConnector::new());
        let waiter = {
            let connector = connector.clone();
            tokio::spawn(async move {
                connector
                    .pop_bulk("q", 1, Duration::from_secs(5))
                    .await
                    .unwrap()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        connector.push_bulk("q", vec![b"x".to_vec()]).await.unwrap();
        let popped = waiter.await.unwrap();
        assert_eq!(popped, vec![b"x".to_vec()]);
    }

    #[tokio::test]
    async fn pop_bulk_times_out_on_an_empty_queue() {
        let connector = InMemoryConnector::new();
        let popped = connector
            .pop_bulk("q", 1, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(popped.is_empty());
    }
}
