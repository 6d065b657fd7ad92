//! Broker configuration structures.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::PriorityOrder;

/// Settings for one [`ResourceBroker`](crate::core::ResourceBroker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Maximum number of registered resources; also the idle-queue capacity.
    pub max_resources: usize,
    /// Capacity of each resource's waiter FIFO.
    pub waiter_capacity: usize,
    /// Which idle resource `acquire_any` prefers.
    #[serde(default)]
    pub order: PriorityOrder,
    /// Priority at which newly registered resources are enrolled as idle.
    #[serde(default)]
    pub default_priority: i64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_resources: 64,
            waiter_capacity: 16,
            order: PriorityOrder::Ascending,
            default_priority: 0,
        }
    }
}

impl BrokerConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of registered resources.
    #[must_use]
    pub const fn with_max_resources(mut self, max_resources: usize) -> Self {
        self.max_resources = max_resources;
        self
    }

    /// Set the per-resource waiter FIFO capacity.
    #[must_use]
    pub const fn with_waiter_capacity(mut self, waiter_capacity: usize) -> Self {
        self.waiter_capacity = waiter_capacity;
        self
    }

    /// Set the idle-queue order.
    #[must_use]
    pub const fn with_order(mut self, order: PriorityOrder) -> Self {
        self.order = order;
        self
    }

    /// Set the enrolment priority used by `register`.
    #[must_use]
    pub const fn with_default_priority(mut self, priority: i64) -> Self {
        self.default_priority = priority;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_resources == 0 {
            return Err("max_resources must be greater than 0".into());
        }
        if self.waiter_capacity == 0 {
            return Err("waiter_capacity must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a broker configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a configuration from `{PREFIX}_MAX_RESOURCES`,
    /// `{PREFIX}_WAITER_CAPACITY`, `{PREFIX}_ORDER` and
    /// `{PREFIX}_DEFAULT_PRIORITY`, loading a `.env` file first if present.
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed variable or invalid value.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let cfg = Self {
            max_resources: env_or(&format!("{prefix}_MAX_RESOURCES"), defaults.max_resources)?,
            waiter_capacity: env_or(
                &format!("{prefix}_WAITER_CAPACITY"),
                defaults.waiter_capacity,
            )?,
            order: match env::var(format!("{prefix}_ORDER")) {
                Ok(raw) => parse_order(&raw)?,
                Err(_) => defaults.order,
            },
            default_priority: env_or(
                &format!("{prefix}_DEFAULT_PRIORITY"),
                defaults.default_priority,
            )?,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_or<T>(var: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("{var}: cannot parse `{raw}`: {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_order(raw: &str) -> Result<PriorityOrder, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ascending" | "asc" => Ok(PriorityOrder::Ascending),
        "descending" | "desc" => Ok(PriorityOrder::Descending),
        other => Err(format!("unknown priority order `{other}`")),
    }
}

/// Named broker configurations, one broker per device family or subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSetConfig {
    /// Map of broker name to configuration.
    pub brokers: HashMap<String, BrokerConfig>,
}

impl BrokerSetConfig {
    /// Validate all brokers and ensure at least one exists.
    ///
    /// # Errors
    ///
    /// Returns a description naming the first invalid broker.
    pub fn validate(&self) -> Result<(), String> {
        if self.brokers.is_empty() {
            return Err("at least one broker must be defined".into());
        }
        for (name, broker) in &self.brokers {
            broker
                .validate()
                .map_err(|e| format!("broker `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse a broker set from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
