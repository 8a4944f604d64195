// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// Errors surfaced by the task-queue engine.
///
/// Variants map 1:1 onto the error kinds a worker process can observe: some are
/// fatal at startup, some are scoped to a single task and routed to a hook,
/// some are control-flow signals raised by `work()` rather than true failures.
#[derive(Clone, Debug, Deserialize, Error, PartialEq, Eq, Serialize)]
pub enum Error {
    #[error("invalid worker configuration: {0}")]
    ConfigError(String),
    #[error("broker connector unavailable: {0}")]
    ConnectorUnavailable(String),
    #[error("task codec error: {0}")]
    CodecError(String),
    #[error("task timed out at the {0} tier")]
    Timeout(TimeoutTier),
    #[error("task failed: {0}")]
    Failure(String),
}

impl Error {
    /// Returns a stable label suitable for metrics/log `reason` fields.
    pub fn get_label(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "config_error",
            Self::ConnectorUnavailable(_) => "connector_unavailable",
            Self::CodecError(_) => "codec_error",
            Self::Timeout(_) => "timeout",
            Self::Failure(_) => "failure",
        }
    }
}

/// Which escalation tier of the Killer fired, attached to a timeout outcome
/// so `on_timeout` handlers can distinguish a cooperative soft timeout from
/// a forced hard abort.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TimeoutTier {
    Soft,
    Hard,
}

impl std::fmt::Display for TimeoutTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Soft => write!(f, "soft"),
            Self::Hard => write!(f, "hard"),
        }
    }
}
