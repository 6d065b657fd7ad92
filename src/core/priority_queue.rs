//! Fixed-capacity priority queue over the slot arena.
//!
//! Entries are kept sorted in the live chain, so pulling is O(1) and pushing
//! is an O(n) walk followed by an O(1) two-slot write.

use serde::{Deserialize, Serialize};

use super::arena::{Arena, Cursor};

/// Direction in which priorities are served, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOrder {
    /// Smallest priority first.
    #[default]
    Ascending,
    /// Largest priority first.
    Descending,
}

impl PriorityOrder {
    /// Whether `candidate` must be served strictly before `incumbent`.
    ///
    /// Equal priorities never sort before each other, which keeps arrival
    /// order among ties.
    #[must_use]
    pub const fn sorts_before(self, candidate: i64, incumbent: i64) -> bool {
        match self {
            Self::Ascending => candidate < incumbent,
            Self::Descending => candidate > incumbent,
        }
    }
}

/// Bounded queue served in priority order with FIFO tie-break.
///
/// The value type needs no ordering of its own; only the separate `i64`
/// priority is compared.
///
/// # Examples
///
/// ```
/// use prometheus_broker::core::{BoundedPriorityQueue, PriorityOrder};
///
/// let mut pq = BoundedPriorityQueue::new(3, PriorityOrder::Ascending);
/// pq.push(5, "a").unwrap();
/// pq.push(1, "b").unwrap();
/// pq.push(5, "c").unwrap();
/// assert_eq!(pq.snapshot(), vec!["b", "a", "c"]);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedPriorityQueue<T> {
    arena: Arena<T, i64>,
    order: PriorityOrder,
}

impl<T> BoundedPriorityQueue<T> {
    /// Create an empty queue holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, order: PriorityOrder) -> Self {
        Self {
            arena: Arena::new(capacity),
            order,
        }
    }

    /// Insert `value` behind every entry that is served no later than it.
    ///
    /// # Errors
    ///
    /// Returns the value back when the queue is full; the queue is unchanged.
    pub fn push(&mut self, priority: i64, value: T) -> Result<(), T> {
        if self.arena.is_full() {
            return Err(value);
        }
        let order = self.order;
        match self
            .arena
            .position(|incumbent, _| order.sorts_before(priority, incumbent))
        {
            Some(stop) => self.arena.insert_before(stop, priority, value),
            None => self.arena.push_back(priority, value),
        }
    }

    /// Remove and return the first-served value.
    pub fn pull(&mut self) -> Option<T> {
        self.pull_entry().map(|(_, v)| v)
    }

    /// Remove and return the first-served value with its priority.
    pub fn pull_entry(&mut self) -> Option<(i64, T)> {
        self.arena.pop_front()
    }

    /// Peek at the first-served value.
    #[must_use]
    pub fn head(&self) -> Option<&T> {
        self.arena.head().map(|(_, v)| v)
    }

    /// Priority of the first-served value.
    #[must_use]
    pub fn head_priority(&self) -> Option<i64> {
        self.arena.head().map(|(p, _)| p)
    }

    /// Remove the first entry (in serving order) whose value matches `pred`.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Option<(i64, T)>
    where
        F: FnMut(&T) -> bool,
    {
        self.arena.remove_where(|_, v| pred(v))
    }

    /// Values in serving order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.arena.iter().map(|(_, v)| v)
    }

    /// `(priority, value)` pairs in serving order.
    pub fn iter_entries(&self) -> impl Iterator<Item = (i64, &T)> + '_ {
        self.arena.iter()
    }

    /// Drop every entry, keeping the allocation.
    pub fn clear(&mut self) {
        self.arena.clear();
    }

    /// Serving direction.
    #[must_use]
    pub const fn order(&self) -> PriorityOrder {
        self.order
    }

    /// Number of queued entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the queue holds no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Whether a push would be rejected.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.arena.is_full()
    }

    /// Fixed capacity chosen at construction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Slots currently on the free chain. Always `capacity() - len()`.
    #[must_use]
    pub fn idle_slots(&self) -> usize {
        self.arena.capacity() - self.arena.len()
    }

    /// Start a forward walk at the first-served entry.
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.arena.cursor()
    }

    /// Yield the entry at the cursor and step past it.
    pub fn advance(&self, cursor: &mut Cursor) -> Option<(i64, &T)> {
        self.arena.advance(cursor)
    }

    /// Remove the entry most recently yielded by [`advance`](Self::advance).
    pub fn remove_at(&mut self, cursor: &mut Cursor) -> Option<(i64, T)> {
        self.arena.remove_at(cursor)
    }
}

impl<T: PartialEq> BoundedPriorityQueue<T> {
    /// Remove the first entry equal to `value`, returning it with its priority.
    pub fn pop_value(&mut self, value: &T) -> Option<(i64, T)> {
        self.remove_where(|v| v == value)
    }

    /// Whether an entry equal to `value` is queued.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.iter().any(|v| v == value)
    }
}

impl<T: Clone> BoundedPriorityQueue<T> {
    /// Copy of the values in serving order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Copy of the `(priority, value)` pairs in serving order.
    #[must_use]
    pub fn entries(&self) -> Vec<(i64, T)> {
        self.iter_entries().map(|(p, v)| (p, v.clone())).collect()
    }
}
