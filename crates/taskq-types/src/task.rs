// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque argument bag passed to `work()`. Keys are caller-defined; values are
/// anything representable in the wire format.
pub type Kwargs = BTreeMap<String, serde_json::Value>;

/// A single unit of work pulled from the broker.
///
/// Immutable from the executor's point of view: a retry or requeue produces a
/// *new* record rather than mutating this one in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Identifies the worker class; by convention also the queue name, unless
    /// routed explicitly by the enqueuing caller.
    pub name: String,
    pub kwargs: Kwargs,
    /// Number of times the broker has delivered this logical task. Starts at
    /// 0 and is incremented on every retry; left unchanged on requeue.
    pub run_count: u32,
    /// Monotonic enqueue timestamp (epoch millis). Informational only; the
    /// engine never orders on it.
    pub date: i64,
}

impl TaskRecord {
    pub fn new(name: impl Into<String>, kwargs: Kwargs, date: i64) -> Self {
        Self {
            name: name.into(),
            kwargs,
            run_count: 0,
            date,
        }
    }

    /// Produces the record that gets re-enqueued after a `WorkerRetry`
    /// outcome: same task, `run_count` incremented.
    pub fn for_retry(&self) -> Self {
        Self {
            run_count: self.run_count + 1,
            ..self.clone()
        }
    }

    /// Produces the record that gets re-enqueued after a `WorkerRequeue`
    /// outcome: same task, `run_count` unchanged.
    pub fn for_requeue(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs() -> Kwargs {
        let mut m = Kwargs::new();
        m.insert("x".to_string(), serde_json::json!(1));
        m
    }

    #[test]
    fn retry_increments_run_count() {
        let t = TaskRecord::new("send_email", kwargs(), 0);
        let retried = t.for_retry();
        assert_eq!(retried.run_count, 1);
        assert_eq!(retried.name, t.name);
        assert_eq!(retried.kwargs, t.kwargs);
    }

    #[test]
    fn requeue_preserves_run_count() {
        let mut t = TaskRecord::new("send_email", kwargs(), 0);
        t.run_count = 3;
        let requeued = t.for_requeue();
        assert_eq!(requeued.run_count, 3);
    }
}
