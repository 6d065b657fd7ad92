//! Tests for error types

use prometheus_broker::core::BrokerError;

#[test]
fn test_duplicate_id_error() {
    let err = BrokerError::DuplicateId("axis-x".to_string());
    assert_eq!(format!("{}", err), "duplicate resource id: axis-x");
}

#[test]
fn test_not_registered_error() {
    let err = BrokerError::NotRegistered("axis-y".to_string());
    assert_eq!(format!("{}", err), "resource not registered: axis-y");
}

#[test]
fn test_not_held_error() {
    let err = BrokerError::NotHeld("axis-z".to_string());
    assert_eq!(format!("{}", err), "resource not held: axis-z");
}

#[test]
fn test_capacity_exhausted_error() {
    let err = BrokerError::CapacityExhausted(8);
    assert_eq!(format!("{}", err), "broker capacity exhausted (8 resources)");
}

#[test]
fn test_wait_outcome_errors() {
    assert_eq!(BrokerError::Cancelled.to_string(), "acquire cancelled");
    assert_eq!(BrokerError::Timeout.to_string(), "acquire timed out");
    assert_eq!(
        BrokerError::Unregistered("plc".into()).to_string(),
        "resource unregistered while waiting: plc"
    );
}

#[test]
fn test_broker_error_into_anyhow() {
    let result: prometheus_broker::core::AppResult<()> =
        Err(BrokerError::InvalidConfig("max_resources must be greater than 0".into()).into());
    let err = result.unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid configuration: max_resources must be greater than 0"
    );
}
