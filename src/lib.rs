//! # Prometheus Broker
//!
//! Fixed-capacity concurrent containers and an exclusive-ownership resource
//! broker for device and connection arbitration.
//!
//! Drivers for physical axes, fieldbus connectors or pub/sub sessions all need
//! the same thing: at most one task talking to a device at a time, a fair line
//! for tasks that want a specific device, and a quick way to grab "any free
//! one". This crate provides that layer without allocating per operation.
//!
//! ## Containers
//!
//! - [`crate::core::BoundedQueue`]: FIFO with O(1) push/pull, equality-based
//!   cancellation of a queued entry, and a forward cursor that can remove in
//!   place.
//! - [`crate::core::BoundedPriorityQueue`]: ranked queue with stable ties; insertion
//!   finds its position in O(n) and writes exactly two slots.
//! - [`crate::core::SharedQueue`] / [`crate::core::SharedPriorityQueue`]: the same behind a
//!   single coarse lock.
//!
//! All of them allocate their slot array once at construction and never grow.
//! A full container hands the pushed value back instead of failing.
//!
//! ## ResourceBroker
//!
//! ```rust,ignore
//! use prometheus_broker::config::BrokerConfig;
//! use prometheus_broker::core::{PriorityOrder, ResourceBroker};
//! use tokio_util::sync::CancellationToken;
//!
//! let broker = ResourceBroker::new(
//!     BrokerConfig::new()
//!         .with_max_resources(8)
//!         .with_waiter_capacity(4)
//!         .with_order(PriorityOrder::Ascending),
//! )?;
//! broker.register("axis-x", axis_x)?;
//! broker.register("axis-y", axis_y)?;
//!
//! // Wait for a specific device, abandoning the wait on shutdown.
//! let shutdown = CancellationToken::new();
//! let axis = broker.acquire(&"axis-x", &shutdown).await?;
//! axis.move_to(120.0).await;
//! broker.release(0, &"axis-x")?;
//!
//! // Or take whichever idle device ranks best, without waiting.
//! if let Some((id, axis)) = broker.acquire_any() {
//!     axis.home().await;
//!     broker.release(1, &id)?;
//! }
//! ```
//!
//! For complete scenarios, see:
//! - `tests/broker_test.rs` - exclusivity, fairness and cancellation
//! - `tests/queue_test.rs` - container ordering and capacity properties

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Bounded containers, the resource broker and their errors.
pub mod core;
/// Configuration models for brokers.
pub mod config;
/// Builders to construct brokers from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
