// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The worker execution engine: the `TaskQueue` facade over a broker
//! connector, the escalating-timeout `Killer`, the serial and threaded
//! `Executor`s, the `Worker` trait user code implements, and the
//! `Supervisor` outer loop that ties them together.

pub mod executor;
pub mod killer;
pub mod queue;
pub mod supervisor;
pub mod worker;

pub use executor::{build_executor, Executor, SerialExecutor, ThreadedExecutor};
pub use killer::{CancellationToken, Killer};
pub use queue::TaskQueue;
pub use supervisor::{StopSignal, Supervisor};
pub use worker::Worker;
