//! Error types for broker operations.

use thiserror::Error;

/// Errors produced by the resource broker.
///
/// Container capacity exhaustion is not an error: bounded queues hand the
/// rejected value back instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// A resource is already registered under this id.
    #[error("duplicate resource id: {0}")]
    DuplicateId(String),
    /// No resource is registered under this id.
    #[error("resource not registered: {0}")]
    NotRegistered(String),
    /// Release of a resource nobody holds.
    #[error("resource not held: {0}")]
    NotHeld(String),
    /// The broker already tracks its configured maximum of resources.
    #[error("broker capacity exhausted ({0} resources)")]
    CapacityExhausted(usize),
    /// The resource was unregistered while the caller waited for it.
    #[error("resource unregistered while waiting: {0}")]
    Unregistered(String),
    /// The caller's cancellation token fired before ownership arrived.
    #[error("acquire cancelled")]
    Cancelled,
    /// The acquire deadline elapsed before ownership arrived.
    #[error("acquire timed out")]
    Timeout,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
