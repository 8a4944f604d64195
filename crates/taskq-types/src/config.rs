// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which concurrency strategy an `Executor` uses to drain a batch.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorMode {
    /// One task at a time on the calling context.
    Serial,
    /// Up to `number_of_threads` tasks concurrently from the same batch.
    Threaded { number_of_threads: usize },
}

/// The three escalating deadlines enforced by the Killer, in seconds.
/// A tier of `0` disables that tier; later tiers are still enforced relative
/// to `arm()` even if an earlier one is disabled.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Timeouts {
    pub soft: u64,
    pub hard: u64,
    pub critical: u64,
}

impl Timeouts {
    pub const fn disabled() -> Self {
        Self {
            soft: 0,
            hard: 0,
            critical: 0,
        }
    }

    fn validate(&self) -> Result<()> {
        let monotone = |a: u64, b: u64| a == 0 || b == 0 || a <= b;
        if !monotone(self.soft, self.hard) {
            return Err(Error::ConfigError(format!(
                "soft timeout ({}) must be <= hard timeout ({})",
                self.soft, self.hard
            )));
        }
        if !monotone(self.hard, self.critical) {
            return Err(Error::ConfigError(format!(
                "hard timeout ({}) must be <= critical timeout ({})",
                self.hard, self.critical
            )));
        }
        if !monotone(self.soft, self.critical) {
            return Err(Error::ConfigError(format!(
                "soft timeout ({}) must be <= critical timeout ({})",
                self.soft, self.critical
            )));
        }
        Ok(())
    }
}

/// Back-off policy applied when a worker observes too many consecutive empty
/// fetches in a row, so an idle queue doesn't spin the supervisor loop.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct StarvationPolicy {
    pub max_consecutive_empty_fetches: u32,
    pub backoff_seconds: u64,
}

impl Default for StarvationPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_empty_fetches: 3,
            backoff_seconds: 1,
        }
    }
}

/// Driver tags `taskq-broker::connect` knows how to dispatch on. Kept here,
/// alongside `WorkerConfig`'s own validation, rather than in `taskq-broker`
/// itself so config validation doesn't have to depend on the broker crate;
/// `taskq-broker::connect` matches on this same list when it builds the
/// connector a worker process actually runs against.
pub const KNOWN_DRIVERS: &[&str] = &["redis", "memory"];

/// Names which broker driver to construct and the parameters it needs. An
/// unrecognized tag is a `ConfigError` raised at construction (§4.D), not at
/// first use — see [`KNOWN_DRIVERS`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ConnectorDescriptor {
    pub driver: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ConnectorDescriptor {
    pub fn redis(address: impl Into<String>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("address".to_string(), address.into());
        Self {
            driver: "redis".to_string(),
            params,
        }
    }
}

/// Immutable, per-worker-class declarative policy. Constructed once and
/// validated at construction; never mutated afterward.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    pub name: String,
    pub connector: ConnectorDescriptor,
    #[serde(default = "Timeouts::disabled")]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_executor_mode")]
    pub executor_mode: ExecutorMode,
    #[serde(default = "default_tasks_per_transaction")]
    pub tasks_per_transaction: usize,
    #[serde(default)]
    pub starvation: Option<StarvationPolicy>,
}

fn default_executor_mode() -> ExecutorMode {
    ExecutorMode::Serial
}

fn default_tasks_per_transaction() -> usize {
    1
}

impl WorkerConfig {
    pub fn builder(name: impl Into<String>, connector: ConnectorDescriptor) -> WorkerConfigBuilder {
        WorkerConfigBuilder::new(name, connector)
    }

    fn validate(&self) -> Result<()> {
        self.timeouts.validate()?;
        if !KNOWN_DRIVERS.contains(&self.connector.driver.as_str()) {
            return Err(Error::ConfigError(format!(
                "unrecognized connector driver {:?}; expected one of {:?}",
                self.connector.driver, KNOWN_DRIVERS
            )));
        }
        if self.tasks_per_transaction == 0 {
            return Err(Error::ConfigError(
                "tasks_per_transaction must be >= 1".to_string(),
            ));
        }
        if let ExecutorMode::Threaded { number_of_threads } = self.executor_mode {
            if number_of_threads == 0 {
                return Err(Error::ConfigError(
                    "threaded executor requires number_of_threads >= 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder that performs the §4.D validation at `build()` time, mirroring
/// how the rest of this codebase constructs immutable config types.
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    fn new(name: impl Into<String>, connector: ConnectorDescriptor) -> Self {
        Self {
            config: WorkerConfig {
                name: name.into(),
                connector,
                timeouts: Timeouts::disabled(),
                max_retries: 0,
                executor_mode: ExecutorMode::Serial,
                tasks_per_transaction: 1,
                starvation: None,
            },
        }
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn executor_mode(mut self, mode: ExecutorMode) -> Self {
        self.config.executor_mode = mode;
        self
    }

    pub fn tasks_per_transaction(mut self, n: usize) -> Self {
        self.config.tasks_per_transaction = n;
        self
    }

    pub fn starvation(mut self, policy: StarvationPolicy) -> Self {
        self.config.starvation = Some(policy);
        self
    }

    pub fn build(self) -> Result<WorkerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_monotone_timeouts() {
        let err = WorkerConfig::builder("w", ConnectorDescriptor::redis("redis://localhost"))
            .timeouts(Timeouts {
                soft: 5,
                hard: 2,
                critical: 10,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn zero_tiers_are_skipped_but_others_still_checked() {
        let timeouts = Timeouts {
            soft: 0,
            hard: 5,
            critical: 2,
        };
        let err = WorkerConfig::builder("w", ConnectorDescriptor::redis("redis://localhost"))
            .timeouts(timeouts)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn rejects_an_unrecognized_connector_driver() {
        let err = WorkerConfig::builder(
            "w",
            ConnectorDescriptor {
                driver: "smtp".to_string(),
                params: BTreeMap::new(),
            },
        )
        .build()
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = WorkerConfig::builder("w", ConnectorDescriptor::redis("redis://localhost"))
            .tasks_per_transaction(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn accepts_valid_config() {
        let config = WorkerConfig::builder("w", ConnectorDescriptor::redis("redis://localhost"))
            .timeouts(Timeouts {
                soft: 1,
                hard: 5,
                critical: 10,
            })
            .max_retries(2)
            .build()
            .unwrap();
        assert_eq!(config.name, "w");
        assert_eq!(config.max_retries, 2);
    }
}
