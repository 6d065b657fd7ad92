//! Builders to construct resource brokers from configuration.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::config::{BrokerConfig, BrokerSetConfig};
use crate::core::{BrokerError, ResourceBroker};

/// Build one broker, validating its configuration first.
///
/// # Errors
///
/// Returns `BrokerError::InvalidConfig` if the configuration is invalid.
pub fn build_broker<Id, R>(cfg: &BrokerConfig) -> Result<ResourceBroker<Id, R>, BrokerError>
where
    Id: Eq + Hash + Clone + Debug,
    R: Clone,
{
    ResourceBroker::new(cfg.clone())
}

/// Build every broker of a broker set, keyed by name.
///
/// # Errors
///
/// Returns `BrokerError::InvalidConfig` naming the first invalid broker.
pub fn build_brokers<Id, R>(
    cfg: &BrokerSetConfig,
) -> Result<HashMap<String, ResourceBroker<Id, R>>, BrokerError>
where
    Id: Eq + Hash + Clone + Debug,
    R: Clone,
{
    cfg.validate().map_err(BrokerError::InvalidConfig)?;

    let mut brokers = HashMap::with_capacity(cfg.brokers.len());
    for (name, broker_cfg) in &cfg.brokers {
        let broker = build_broker(broker_cfg)
            .map_err(|e| BrokerError::InvalidConfig(format!("broker `{name}`: {e}")))?;
        tracing::debug!(
            broker = %name,
            max_resources = broker_cfg.max_resources,
            waiter_capacity = broker_cfg.waiter_capacity,
            "broker built"
        );
        brokers.insert(name.clone(), broker);
    }
    Ok(brokers)
}
