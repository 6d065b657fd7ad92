//! Tests for configuration validation

use prometheus_broker::config::{BrokerConfig, BrokerSetConfig};
use prometheus_broker::core::PriorityOrder;

#[test]
fn test_broker_config_validation() {
    let valid = BrokerConfig {
        max_resources: 4,
        waiter_capacity: 8,
        order: PriorityOrder::Descending,
        default_priority: 3,
    };
    assert!(valid.validate().is_ok());
    assert!(BrokerConfig::default().validate().is_ok());
}

#[test]
fn test_broker_config_invalid_max_resources() {
    let invalid = BrokerConfig::new().with_max_resources(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_broker_config_invalid_waiter_capacity() {
    let invalid = BrokerConfig::new().with_waiter_capacity(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_broker_config_from_json_defaults_order() {
    let json = r#"{ "max_resources": 2, "waiter_capacity": 3 }"#;
    let cfg = BrokerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.order, PriorityOrder::Ascending);
    assert_eq!(cfg.default_priority, 0);
}

#[test]
fn test_broker_config_from_json_rejects_invalid() {
    let json = r#"{ "max_resources": 0, "waiter_capacity": 3, "order": "descending" }"#;
    assert!(BrokerConfig::from_json_str(json).is_err());
    assert!(BrokerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_broker_set_config_empty() {
    let config = BrokerSetConfig {
        brokers: std::collections::HashMap::new(),
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_broker_set_config_from_json() {
    let json = r#"{
        "brokers": {
            "axes": {
                "max_resources": 6,
                "waiter_capacity": 4,
                "order": "descending",
                "default_priority": 1
            },
            "plc": {
                "max_resources": 1,
                "waiter_capacity": 16
            }
        }
    }"#;

    let config = BrokerSetConfig::from_json_str(json).unwrap();
    assert_eq!(config.brokers.len(), 2);
    assert_eq!(config.brokers["axes"].order, PriorityOrder::Descending);
}

#[test]
fn test_broker_set_config_names_invalid_member() {
    let json = r#"{ "brokers": { "bad": { "max_resources": 1, "waiter_capacity": 0 } } }"#;
    let err = BrokerSetConfig::from_json_str(json).unwrap_err();
    assert!(err.contains("bad"), "{err}");
}
