//! Tests for broker builders

use prometheus_broker::builders::{build_broker, build_brokers};
use prometheus_broker::config::{BrokerConfig, BrokerSetConfig};
use prometheus_broker::core::{BrokerError, ResourceBroker};

#[test]
fn test_build_broker_from_config() {
    let cfg = BrokerConfig::new().with_max_resources(2).with_default_priority(7);
    let broker: ResourceBroker<u32, String> = build_broker(&cfg).unwrap();
    broker.register(1, "spindle".into()).unwrap();
    assert_eq!(broker.config().default_priority, 7);
    assert_eq!(broker.stats().max_resources, 2);
}

#[test]
fn test_build_broker_rejects_invalid() {
    let cfg = BrokerConfig::new().with_waiter_capacity(0);
    let result: Result<ResourceBroker<u32, String>, _> = build_broker(&cfg);
    assert!(matches!(result, Err(BrokerError::InvalidConfig(_))));
}

#[test]
fn test_build_brokers_by_name() {
    let mut brokers = std::collections::HashMap::new();
    brokers.insert("axes".to_string(), BrokerConfig::new().with_max_resources(3));
    brokers.insert("plc".to_string(), BrokerConfig::new().with_max_resources(1));
    let cfg = BrokerSetConfig { brokers };

    let built = build_brokers::<String, u8>(&cfg).unwrap();
    assert_eq!(built.len(), 2);
    assert_eq!(built["axes"].stats().max_resources, 3);
    assert_eq!(built["plc"].stats().max_resources, 1);
}
