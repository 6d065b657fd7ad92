//! Exclusive-ownership resource broker built on the bounded containers.
//!
//! Each registered resource is either idle or held by exactly one caller.
//! Idle resources are ranked in a [`BoundedPriorityQueue`] so
//! [`ResourceBroker::acquire_any`] hands out the best idle resource first.
//! Callers asking for a specific busy resource queue in that resource's
//! [`BoundedQueue`] of wakeup signals and are served in arrival order; a
//! release passes ownership straight to the oldest waiter without the resource
//! ever becoming idle in between.
//!
//! All state sits behind one `parking_lot::Mutex` that is never held across an
//! `.await`.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_broker::config::BrokerConfig;
//! use prometheus_broker::core::ResourceBroker;
//! use tokio_util::sync::CancellationToken;
//!
//! let broker = ResourceBroker::new(BrokerConfig::new())?;
//! broker.register("axis-x", axis_x)?;
//!
//! let cancel = CancellationToken::new();
//! let axis = broker.acquire(&"axis-x", &cancel).await?;
//! axis.home().await;
//! broker.release(0, &"axis-x")?;
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::futures::Notified;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::BrokerConfig;

use super::{BoundedPriorityQueue, BoundedQueue, BrokerError, PriorityOrder};

/// Point-in-time counts describing broker utilisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Registered resources.
    pub registered: usize,
    /// Resources currently in the idle-priority queue.
    pub idle: usize,
    /// Resources currently held.
    pub busy: usize,
    /// Callers queued on some resource's waiter FIFO.
    pub waiting: usize,
    /// Unregistered ids whose last holder has not released yet.
    pub retired: usize,
    /// Configured resource limit.
    pub max_resources: usize,
}

/// One-shot wakeup carrying ownership of the resource to a single waiter.
struct Signal<R> {
    ticket: u64,
    tx: oneshot::Sender<R>,
}

struct ResourceRecord<R> {
    resource: R,
    busy: bool,
    waiters: BoundedQueue<Signal<R>>,
    /// Priority from the latest release, reused when a cancelled waiter
    /// passes ownership back.
    last_priority: i64,
}

struct BrokerState<Id, R> {
    records: HashMap<Id, ResourceRecord<R>>,
    idle: BoundedPriorityQueue<Id>,
    /// Ids unregistered while held. Reserved until the holder releases.
    retired: HashSet<Id>,
    next_ticket: u64,
}

/// What a busy-resource acquire waits on next.
enum Pending<'a, R> {
    /// Our signal sits in the waiter FIFO.
    Signal(u64, oneshot::Receiver<R>),
    /// The FIFO was full; wait for a slot to free up and retry.
    SlotFreed(Notified<'a>),
}

/// Outcome of handing a released resource on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handoff {
    Waiter,
    Idle,
}

/// Arbitrates exclusive access to a set of registered resources.
///
/// `R` is handed out by clone, so it is usually a cheap handle such as an
/// `Arc` around the device or connection.
pub struct ResourceBroker<Id, R> {
    config: BrokerConfig,
    state: Mutex<BrokerState<Id, R>>,
    /// Fired whenever a waiter slot may have been freed.
    slot_freed: Notify,
}

impl<Id, R> ResourceBroker<Id, R>
where
    Id: Eq + Hash + Clone + Debug,
    R: Clone,
{
    /// Create a broker from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: BrokerConfig) -> Result<Self, BrokerError> {
        config.validate().map_err(BrokerError::InvalidConfig)?;
        Ok(Self::from_parts(config))
    }

    /// Create a broker from plain capacities.
    #[must_use]
    pub fn with_capacity(max_resources: usize, waiter_capacity: usize, order: PriorityOrder) -> Self {
        Self::from_parts(
            BrokerConfig::new()
                .with_max_resources(max_resources)
                .with_waiter_capacity(waiter_capacity)
                .with_order(order),
        )
    }

    fn from_parts(config: BrokerConfig) -> Self {
        let state = BrokerState {
            records: HashMap::with_capacity(config.max_resources),
            idle: BoundedPriorityQueue::new(config.max_resources, config.order),
            retired: HashSet::new(),
            next_ticket: 0,
        };
        Self {
            config,
            state: Mutex::new(state),
            slot_freed: Notify::new(),
        }
    }

    /// Configuration this broker was built with.
    #[must_use]
    pub const fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Register `resource` under `id`, enrolled idle at the default priority.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if `id` is present, `CapacityExhausted` if the broker is full.
    pub fn register(&self, id: Id, resource: R) -> Result<(), BrokerError> {
        self.register_with_priority(id, resource, self.config.default_priority)
    }

    /// Register `resource` under `id`, enrolled idle at `priority`.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if `id` is present or still held from before an
    /// unregister, `CapacityExhausted` if the broker is full.
    pub fn register_with_priority(
        &self,
        id: Id,
        resource: R,
        priority: i64,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if state.records.contains_key(&id) || state.retired.contains(&id) {
            return Err(BrokerError::DuplicateId(format!("{id:?}")));
        }
        if state.records.len() >= self.config.max_resources {
            return Err(BrokerError::CapacityExhausted(self.config.max_resources));
        }
        // Idle entries never outnumber records, so this only fails with the check above.
        if state.idle.push(priority, id.clone()).is_err() {
            return Err(BrokerError::CapacityExhausted(self.config.max_resources));
        }
        state.records.insert(
            id.clone(),
            ResourceRecord {
                resource,
                busy: false,
                waiters: BoundedQueue::new(self.config.waiter_capacity),
                last_priority: priority,
            },
        );
        debug!(id = ?id, priority, "resource registered");
        Ok(())
    }

    /// Remove `id` from the broker and return its resource.
    ///
    /// A current holder is not evicted; its later release reports
    /// `NotRegistered`, and until then `id` cannot be registered again.
    /// Callers waiting on the resource observe `BrokerError::Unregistered`.
    ///
    /// # Errors
    ///
    /// `NotRegistered` if `id` is unknown.
    pub fn unregister(&self, id: &Id) -> Result<R, BrokerError> {
        let record = {
            let mut state = self.state.lock();
            state.idle.remove_where(|v| v == id);
            let record = state
                .records
                .remove(id)
                .ok_or_else(|| BrokerError::NotRegistered(format!("{id:?}")))?;
            if record.busy {
                state.retired.insert(id.clone());
            }
            record
        };
        if !record.waiters.is_empty() {
            debug!(
                id = ?id,
                waiters = record.waiters.len(),
                "unregistered with pending waiters"
            );
        }
        // Dropping the record closes every pending signal.
        let ResourceRecord { resource, .. } = record;
        self.slot_freed.notify_waiters();
        debug!(id = ?id, "resource unregistered");
        Ok(resource)
    }

    /// Take exclusive ownership of `id`, waiting while another caller holds it.
    ///
    /// Waiters on the same id are served in arrival order. If the waiter FIFO
    /// is full the caller sleeps until a slot frees up, without polling.
    ///
    /// # Errors
    ///
    /// - `NotRegistered` immediately if `id` is unknown
    /// - `Cancelled` if `cancel` fires first; the caller's place in line is
    ///   withdrawn and any ownership that raced in is passed on
    /// - `Unregistered` if the resource is unregistered during the wait
    pub async fn acquire(&self, id: &Id, cancel: &CancellationToken) -> Result<R, BrokerError> {
        let mut parked = false;
        loop {
            let pending = {
                let mut state = self.state.lock();
                let BrokerState {
                    records,
                    idle,
                    next_ticket,
                    ..
                } = &mut *state;
                let record = match records.get_mut(id) {
                    Some(record) => record,
                    // Vanished while we waited for a waiter slot.
                    None if parked => return Err(BrokerError::Unregistered(format!("{id:?}"))),
                    None => return Err(BrokerError::NotRegistered(format!("{id:?}"))),
                };

                if !record.busy {
                    record.busy = true;
                    idle.remove_where(|v| v == id);
                    trace!(id = ?id, "acquired idle resource");
                    return Ok(record.resource.clone());
                }
                if cancel.is_cancelled() {
                    return Err(BrokerError::Cancelled);
                }

                if record.waiters.is_full() {
                    // Created before the lock drops, so no wakeup is missed.
                    Pending::SlotFreed(self.slot_freed.notified())
                } else {
                    let ticket = *next_ticket;
                    *next_ticket = next_ticket.wrapping_add(1);
                    let (tx, rx) = oneshot::channel();
                    if record.waiters.push(Signal { ticket, tx }).is_err() {
                        continue;
                    }
                    trace!(id = ?id, ticket, "queued behind holder");
                    Pending::Signal(ticket, rx)
                }
            };

            match pending {
                Pending::Signal(ticket, rx) => {
                    let guard = WaitGuard {
                        broker: self,
                        id: id.clone(),
                        ticket,
                        rx,
                        armed: true,
                    };
                    return guard.wait(cancel).await;
                }
                Pending::SlotFreed(slot_freed) => {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(BrokerError::Cancelled),
                        () = slot_freed => parked = true,
                    }
                }
            }
        }
    }

    /// [`acquire`](Self::acquire) bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// `Timeout` if ownership did not arrive in time, plus the errors of `acquire`.
    pub async fn acquire_timeout(&self, id: &Id, timeout: Duration) -> Result<R, BrokerError> {
        let cancel = CancellationToken::new();
        tokio::time::timeout(timeout, self.acquire(id, &cancel))
            .await
            .map_err(|_| BrokerError::Timeout)?
    }

    /// Take the best-ranked idle resource without waiting.
    ///
    /// Served strictly by idle priority; callers blocked in `acquire` get no
    /// precedence here.
    pub fn acquire_any(&self) -> Option<(Id, R)> {
        let mut state = self.state.lock();
        let BrokerState { records, idle, .. } = &mut *state;
        let id = idle.pull()?;
        let record = records.get_mut(&id)?;
        debug_assert!(!record.busy, "idle queue held a busy resource");
        record.busy = true;
        trace!(id = ?id, "acquired any idle resource");
        Some((id, record.resource.clone()))
    }

    /// Give up ownership of `id`.
    ///
    /// The oldest waiter receives the resource directly; with no waiters it
    /// becomes idle and is ranked at `priority` for `acquire_any`.
    ///
    /// # Errors
    ///
    /// `NotRegistered` if `id` is unknown, `NotHeld` if it is already idle.
    pub fn release(&self, priority: i64, id: &Id) -> Result<(), BrokerError> {
        let outcome = {
            let mut state = self.state.lock();
            hand_off(&mut state, id, priority)?
        };
        self.slot_freed.notify_waiters();
        match outcome {
            Handoff::Waiter => debug!(id = ?id, "ownership handed to waiter"),
            Handoff::Idle => trace!(id = ?id, priority, "resource idle"),
        }
        Ok(())
    }

    /// Pull `id` out of the idle rotation without releasing or acquiring it.
    ///
    /// Returns whether it was in the idle queue.
    pub fn withdraw(&self, id: &Id) -> bool {
        self.state.lock().idle.remove_where(|v| v == id).is_some()
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &Id) -> bool {
        self.state.lock().records.contains_key(id)
    }

    /// Whether `id` is currently held. `None` if unknown.
    #[must_use]
    pub fn is_busy(&self, id: &Id) -> Option<bool> {
        self.state.lock().records.get(id).map(|r| r.busy)
    }

    /// Ids of idle resources in `acquire_any` order.
    #[must_use]
    pub fn idle_ids(&self) -> Vec<Id> {
        self.state.lock().idle.snapshot()
    }

    /// Current utilisation counts.
    #[must_use]
    pub fn stats(&self) -> BrokerStats {
        let state = self.state.lock();
        BrokerStats {
            registered: state.records.len(),
            idle: state.idle.len(),
            busy: state.records.values().filter(|r| r.busy).count(),
            waiting: state.records.values().map(|r| r.waiters.len()).sum(),
            retired: state.retired.len(),
            max_resources: self.config.max_resources,
        }
    }
}

impl<Id, R> Debug for ResourceBroker<Id, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBroker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Pass ownership of a held resource to its oldest live waiter, or park it idle.
///
/// A holder of a retired id gives it up here, which frees the id for
/// registration again.
fn hand_off<Id, R>(
    state: &mut BrokerState<Id, R>,
    id: &Id,
    priority: i64,
) -> Result<Handoff, BrokerError>
where
    Id: Eq + Hash + Clone + Debug,
    R: Clone,
{
    let Some(record) = state.records.get_mut(id) else {
        if state.retired.remove(id) {
            debug!(id = ?id, "retired resource released");
        }
        return Err(BrokerError::NotRegistered(format!("{id:?}")));
    };
    if !record.busy {
        return Err(BrokerError::NotHeld(format!("{id:?}")));
    }
    record.last_priority = priority;

    while let Some(signal) = record.waiters.pull() {
        if signal.tx.send(record.resource.clone()).is_ok() {
            return Ok(Handoff::Waiter);
        }
        warn!(id = ?id, ticket = signal.ticket, "waiter vanished before handoff");
    }

    record.busy = false;
    if state.idle.push(priority, id.clone()).is_err() {
        warn!(id = ?id, "idle queue full; resource left out of rotation");
    }
    Ok(Handoff::Idle)
}

/// A caller's place in a waiter FIFO.
///
/// Dropping an armed guard (cancellation, timeout, or the future itself being
/// dropped) withdraws the signal; if the signal already fired, the ownership
/// it carried is handed on so the resource is never stranded.
struct WaitGuard<'a, Id, R>
where
    Id: Eq + Hash + Clone + Debug,
    R: Clone,
{
    broker: &'a ResourceBroker<Id, R>,
    id: Id,
    ticket: u64,
    rx: oneshot::Receiver<R>,
    armed: bool,
}

impl<Id, R> WaitGuard<'_, Id, R>
where
    Id: Eq + Hash + Clone + Debug,
    R: Clone,
{
    async fn wait(mut self, cancel: &CancellationToken) -> Result<R, BrokerError> {
        tokio::select! {
            biased;
            received = &mut self.rx => {
                self.armed = false;
                match received {
                    Ok(resource) => {
                        debug!(id = ?self.id, ticket = self.ticket, "woken with ownership");
                        Ok(resource)
                    }
                    Err(_) => Err(BrokerError::Unregistered(format!("{:?}", self.id))),
                }
            }
            () = cancel.cancelled() => Err(BrokerError::Cancelled),
        }
    }
}

impl<Id, R> Drop for WaitGuard<'_, Id, R>
where
    Id: Eq + Hash + Clone + Debug,
    R: Clone,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let ticket = self.ticket;
        let mut state = self.broker.state.lock();

        let withdrawn = state
            .records
            .get_mut(&self.id)
            .and_then(|r| r.waiters.remove_where(|s| s.ticket == ticket))
            .is_some();
        if withdrawn {
            drop(state);
            self.broker.slot_freed.notify_waiters();
            debug!(id = ?self.id, ticket, "waiter withdrew");
            return;
        }

        // Not queued any more: either the record is gone or a release already
        // sent us ownership. Signals are only sent under the lock we hold.
        // An id we own cannot be re-registered, so a record found here is ours.
        if self.rx.try_recv().is_ok() {
            let priority = state.records.get(&self.id).map_or(0, |r| r.last_priority);
            let outcome = hand_off(&mut state, &self.id, priority);
            drop(state);
            self.broker.slot_freed.notify_waiters();
            debug!(id = ?self.id, ticket, ?outcome, "abandoned ownership passed on");
        }
    }
}
