//! Configuration models for brokers.

pub mod broker;

pub use broker::{BrokerConfig, BrokerSetConfig};
