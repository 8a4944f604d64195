// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Thin launcher surface (§4.I, §4.K): layered configuration loading plus
//! the generic `ServerArgs::run::<W>()` entry point a binary calls.

pub mod config;
pub mod launcher;

pub use config::WorkerProcessConfig;
pub use launcher::{ServerArgs, WorkerFromConfig};
