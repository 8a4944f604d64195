// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use taskq_types::WorkerConfig;

/// Process-level settings layered on top of a `WorkerConfig`: the document a
/// launcher reads from disk (§4.I). Loading is read → parse (strict) →
/// overlay environment variables sharing the `TASKQ_` prefix → overlay CLI
/// flags (applied by the caller after `load()` returns); a failure at any
/// stage is a fatal `ConfigError` raised before any connector is touched.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerProcessConfig {
    pub worker: WorkerConfig,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_block_timeout_secs")]
    pub block_timeout_secs: u64,
}

fn default_block_timeout_secs() -> u64 {
    1
}

impl WorkerProcessConfig {
    /// Reads and parses `path`, then overlays any recognized `TASKQ_*`
    /// environment variables. Unknown top-level fields in the YAML document
    /// are rejected rather than ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.overlay_env()?;
        config.validate()?;
        Ok(config)
    }

    fn overlay_env(&mut self) -> Result<()> {
        if let Ok(address) = std::env::var("TASKQ_REDIS_ADDRESS") {
            self.worker
                .connector
                .params
                .insert("address".to_string(), address);
        }
        if let Ok(raw) = std::env::var("TASKQ_MAX_RETRIES") {
            self.worker.max_retries = raw
                .parse()
                .context("TASKQ_MAX_RETRIES must be a non-negative integer")?;
        }
        if let Ok(raw) = std::env::var("TASKQ_LOG_JSON") {
            self.log_json = raw
                .parse()
                .context("TASKQ_LOG_JSON must be `true` or `false`")?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !taskq_types::KNOWN_DRIVERS.contains(&self.worker.connector.driver.as_str()) {
            anyhow::bail!(
                "unrecognized worker.connector.driver {:?}; expected one of {:?}",
                self.worker.connector.driver,
                taskq_types::KNOWN_DRIVERS
            );
        }
        Ok(())
    }
}
