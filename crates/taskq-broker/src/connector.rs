// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::time::Duration;
use taskq_types::Result;

/// Primitive queue operations a broker driver must provide. A `TaskQueue`
/// (in `taskq-core`) namespaces by `task_name` on top of this; everything
/// about *which* store backs a queue lives behind this trait.
///
/// Implementations must tolerate transient connection errors by retrying
/// internally; only a persistent failure should surface as
/// [`taskq_types::Error::ConnectorUnavailable`]. There is no ordering
/// guarantee across queue names, but FIFO must hold within one queue name
/// under a single connector endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Pushes encoded task bytes onto the tail of `queue_name`, in order.
    async fn push_bulk(&self, queue_name: &str, items: Vec<Vec<u8>>) -> Result<()>;

    /// Pops up to `n` items from the head of `queue_name`. Blocks up to
    /// `block_timeout` waiting for the first item to become available;
    /// subsequent reads within the same call are non-blocking, so a call can
    /// return fewer than `n` items if the queue runs dry mid-batch.
    async fn pop_bulk(
        &self,
        queue_name: &str,
        n: usize,
        block_timeout: Duration,
    ) -> Result<Vec<Vec<u8>>>;

    /// Current length of `queue_name`.
    async fn length(&self, queue_name: &str) -> Result<u64>;

    /// Removes every item from `queue_name`, returning the count removed.
    /// Purging a queue that doesn't exist returns 0 and is not an error.
    async fn purge(&self, queue_name: &str) -> Result<u64>;
}
