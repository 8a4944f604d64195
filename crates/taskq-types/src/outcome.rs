// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::error::TimeoutTier;

/// The control-flow signals a `work()` implementation can raise instead of
/// succeeding or failing outright. These are not errors in the usual sense —
/// they are how user code asks the executor to re-enqueue the task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkSignal {
    /// Ask the executor to re-enqueue with `run_count` incremented, subject
    /// to `max_retries`.
    Retry,
    /// Ask the executor to re-enqueue with `run_count` unchanged.
    Requeue,
}

impl std::fmt::Display for WorkSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retry => write!(f, "retry"),
            Self::Requeue => write!(f, "requeue"),
        }
    }
}

/// What a `work()` call produced, from the executor's point of view.
/// Anything that isn't a plain success is either one of the two retry
/// signals above or an opaque failure message.
pub type WorkResult = std::result::Result<serde_json::Value, WorkOutcomeSignal>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkOutcomeSignal {
    Signal(WorkSignal),
    Failure(String),
}

/// The terminal classification of one executed task. Exactly one variant is
/// produced per task and selects exactly one hook to dispatch to, via a
/// single match in the executor's commit path.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success(serde_json::Value),
    Retry,
    Requeue,
    MaxRetries,
    Timeout(TimeoutTier),
    Failure(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Retry => "retry",
            Self::Requeue => "requeue",
            Self::MaxRetries => "max_retries",
            Self::Timeout(_) => "timeout",
            Self::Failure(_) => "failure",
        }
    }

    /// Whether this outcome causes a fresh record to be pushed back onto the
    /// broker. `Retry`/`Requeue` do; everything else discards the task.
    pub fn requeues(&self) -> bool {
        matches!(self, Self::Retry | Self::Requeue)
    }
}

/// Synthesizes the terminal [`Outcome`] from what `work()` produced, given
/// the retry policy in effect.
pub fn classify(result: WorkResult, run_count: u32, max_retries: u32) -> Outcome {
    match result {
        Ok(value) => Outcome::Success(value),
        Err(WorkOutcomeSignal::Signal(WorkSignal::Requeue)) => Outcome::Requeue,
        Err(WorkOutcomeSignal::Signal(WorkSignal::Retry)) => {
            if run_count + 1 <= max_retries {
                Outcome::Retry
            } else {
                Outcome::MaxRetries
            }
        },
        Err(WorkOutcomeSignal::Failure(msg)) => Outcome::Failure(msg),
    }
}
