// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::connector::Connector;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use taskq_types::{metrics, Error, Result};
use tracing::warn;

/// Redis-backed [`Connector`]. Lists back each named queue: `push_bulk` is an
/// `RPUSH`, `pop_bulk` is a blocking `BLPOP` for the first item followed by
/// non-blocking `LPOP`s for the rest, `length` is `LLEN`, `purge` is `DEL`.
///
/// Connections are obtained once and reused through a
/// [`ConnectionManager`], which reconnects transparently on drop; every
/// primitive additionally wraps its Redis call in a bounded exponential
/// backoff so a handful of dropped-connection retries never surface to the
/// caller as an error. Only after the backoff budget is exhausted does the
/// call fail with [`Error::ConnectorUnavailable`].
pub struct RedisConnector {
    manager: ConnectionManager,
    max_elapsed: Duration,
}

impl RedisConnector {
    /// Opens a connection manager against `address` (a `redis://` URL).
    /// Connection is established lazily by the manager; this only fails if
    /// the URL itself is malformed.
    pub async fn connect(address: &str) -> Result<Self> {
        let client = redis::Client::open(address)
            .map_err(|e| Error::ConnectorUnavailable(format!("invalid redis address: {e}")))?;
        let manager = client.get_connection_manager().await.map_err(|e| {
            Error::ConnectorUnavailable(format!("failed to connect to redis: {e}"))
        })?;
        Ok(Self {
            manager,
            max_elapsed: Duration::from_secs(5),
        })
    }

    fn backoff(&self) -> impl Backoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(20))
            .with_max_interval(Duration::from_millis(500))
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }

    async fn with_retry<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T>
    where
        F: FnMut(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.manager.clone();
        backoff::future::retry(self.backoff(), || {
            let conn = conn.clone();
            let fut = op(conn);
            async move {
                fut.await.map_err(|e| {
                    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
                        metrics::record_connector_retry();
                        warn!(op = op_name, error = %e, "redis call failed transiently; retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
        .map_err(|e| Error::ConnectorUnavailable(format!("{op_name} failed: {e}")))
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn push_bulk(&self, queue_name: &str, items: Vec<Vec<u8>>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let queue_name = queue_name.to_string();
        self.with_retry("push_bulk", move |mut conn| {
            let queue_name = queue_name.clone();
            let items = items.clone();
            async move {
                let _: i64 = conn.rpush(queue_name, items).await?;
                Ok(())
            }
        })
        .await
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
        let timeout_secs = block_timeout.as_secs_f64();
        let first: Option<(String, Vec<u8>)> = self
            .with_retry("pop_bulk(first)", {
                let queue_name = queue_name.to_string();
                move |mut conn| {
                    let queue_name = queue_name.clone();
                    async move { conn.blpop(queue_name, timeout_secs).await }
                }
            })
            .await?;
        let mut out = Vec::with_capacity(n);
        let Some((_, first)) = first else {
            return Ok(out);
        };
        out.push(first);
        while out.len() < n {
            let next: Option<Vec<u8>> = self
                .with_retry("pop_bulk(rest)", {
                    let queue_name = queue_name.to_string();
                    move |mut conn| {
                        let queue_name = queue_name.clone();
                        async move { conn.lpop(queue_name, None).await }
                    }
                })
                .await?;
            match next {
                Some(item) => out.push(item),
                None => break,
            }
        }
        Ok(out)
    }

    async fn length(&self, queue_name: &str) -> Result<u64> {
        let queue_name = queue_name.to_string();
        self.with_retry("length", move |mut conn| {
            let queue_name = queue_name.clone();
            async move { conn.llen(queue_name).await }
        })
        .await
    }

    async fn purge(&self, queue_name: &str) -> Result<u64> {
        let queue_name = queue_name.to_string();
        let len: u64 = self
            .with_retry("purge(llen)", {
                let queue_name = queue_name.clone();
                move |mut conn| {
                    let queue_name = queue_name.clone();
                    async move { conn.llen(queue_name).await }
                }
            })
            .await?;
        if len == 0 {
            return Ok(0);
        }
        self.with_retry("purge(del)", move |mut conn| {
            let queue_name = queue_name.clone();
            async move {
                let _: i64 = conn.del(queue_name).await?;
                Ok(())
            }
        })
        .await?;
        Ok(len)
    }
}
