// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Shared data types for the task-queue engine: the task record, its wire
//! codec, the outcome state machine, worker configuration, error kinds, and
//! the in-process counter registry (§4.J). Kept dependency-light and
//! synchronous so every other crate in the workspace — including the broker
//! drivers and the executor — can depend on it without pulling in an async
//! runtime.

pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod outcome;
pub mod task;

pub use codec::{decode, encode};
pub use config::{
    ConnectorDescriptor, ExecutorMode, StarvationPolicy, Timeouts, WorkerConfig, KNOWN_DRIVERS,
};
pub use error::{Error, Result, TimeoutTier};
pub use outcome::{classify, Outcome, WorkOutcomeSignal, WorkResult, WorkSignal};
pub use task::{Kwargs, TaskRecord};
