//! Fixed-capacity FIFO queue over the slot arena.

use super::arena::{Arena, Cursor};

/// Bounded first-in first-out queue with O(1) push and pull.
///
/// Storage for `capacity` elements is allocated once by [`BoundedQueue::new`]
/// and never grows. A full queue rejects [`push`](Self::push) by handing the
/// value back, which callers treat as backpressure.
///
/// # Examples
///
/// ```
/// use prometheus_broker::core::BoundedQueue;
///
/// let mut q = BoundedQueue::new(3);
/// for v in 1..=3 {
///     q.push(v).unwrap();
/// }
/// assert_eq!(q.push(4), Err(4));
/// assert_eq!(q.pull(), Some(1));
/// assert!(q.push(4).is_ok());
/// assert_eq!(q.snapshot(), vec![2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    arena: Arena<T, ()>,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue holding at most `capacity` elements.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: Arena::new(capacity),
        }
    }

    /// Enqueue at the tail.
    ///
    /// # Errors
    ///
    /// Returns the value back when the queue is full; the queue is unchanged.
    pub fn push(&mut self, value: T) -> Result<(), T> {
        self.arena.push_back((), value)
    }

    /// Dequeue from the head.
    pub fn pull(&mut self) -> Option<T> {
        self.arena.pop_front().map(|((), v)| v)
    }

    /// Peek at the head without removing it.
    #[must_use]
    pub fn head(&self) -> Option<&T> {
        self.arena.head().map(|((), v)| v)
    }

    /// Remove the first element matching `pred`, preserving the order of the rest.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.arena.remove_where(|(), v| pred(v)).map(|((), v)| v)
    }

    /// Elements from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.arena.iter().map(|((), v)| v)
    }

    /// Drop every element, keeping the allocation.
    pub fn clear(&mut self) {
        self.arena.clear();
    }

    /// Number of queued elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the queue holds no elements.
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

    /// Start a forward walk at the head.
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.arena.cursor()
    }

    /// Yield the element at the cursor and step past it.
    ///
    /// Returns `None` once the element that was at the tail has been yielded,
    /// or if the queue changed since the cursor was taken.
    pub fn advance(&self, cursor: &mut Cursor) -> Option<&T> {
        self.arena.advance(cursor).map(|((), v)| v)
    }

    /// Remove the element most recently yielded by [`advance`](Self::advance).
    ///
    /// The cursor stays usable; it no longer designates an element until the
    /// next `advance`.
    pub fn remove_at(&mut self, cursor: &mut Cursor) -> Option<T> {
        self.arena.remove_at(cursor).map(|((), v)| v)
    }
}

impl<T: PartialEq> BoundedQueue<T> {
    /// Remove the first element equal to `value`. O(n).
    pub fn pop_value(&mut self, value: &T) -> Option<T> {
        self.remove_where(|v| v == value)
    }

    /// Whether an element equal to `value` is queued.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.iter().any(|v| v == value)
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Copy of the queued elements in pull order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
