// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Broker connector abstraction (§4.A). `Connector` is the only trait other
//! crates depend on; `RedisConnector` is the reference production
//! implementation and `InMemoryConnector` is a fake used across this
//! workspace's test suites so none of them require a live Redis instance.

use std::sync::Arc;
use taskq_types::{ConnectorDescriptor, Error, Result};

pub mod connector;
pub mod memory;
pub mod redis;

pub use connector::Connector;
pub use memory::InMemoryConnector;
pub use redis::RedisConnector;

/// Builds the connector named by `descriptor.driver`, the single place that
/// matches on `taskq_types::KNOWN_DRIVERS` to decide which driver to
/// construct. An unrecognized tag is a [`taskq_types::Error::ConfigError`];
/// `WorkerConfig::validate` should already have rejected it earlier, but a
/// descriptor can also arrive here from a caller that built one by hand.
pub async fn connect(descriptor: &ConnectorDescriptor) -> Result<Arc<dyn Connector>> {
    match descriptor.driver.as_str() {
        "redis" => {
            let address = descriptor.params.get("address").ok_or_else(|| {
                Error::ConfigError("redis connector requires an \"address\" param".to_string())
            })?;
            let connector = RedisConnector::connect(address).await?;
            Ok(Arc::new(connector))
        },
        "memory" => Ok(Arc::new(InMemoryConnector::new())),
        other => Err(Error::ConfigError(format!(
            "unrecognized connector driver {other:?}"
        ))),
    }
}
