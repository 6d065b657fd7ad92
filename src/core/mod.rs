//! Bounded containers and the resource broker built on them.

mod arena;
pub mod bounded_queue;
pub mod broker;
pub mod error;
pub mod priority_queue;
pub mod shared;

pub use arena::Cursor;
pub use bounded_queue::BoundedQueue;
pub use broker::{BrokerStats, ResourceBroker};
pub use error::{AppResult, BrokerError};
pub use priority_queue::{BoundedPriorityQueue, PriorityOrder};
pub use shared::{SharedPriorityQueue, SharedQueue};
