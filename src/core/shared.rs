//! Thread-safe handles over the bounded containers.
//!
//! Each handle wraps its container in one coarse `parking_lot::Mutex`. The
//! lock is held for exactly one operation body and never across an `.await`,
//! so the handles are safe to share between threads and async tasks alike.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{BoundedPriorityQueue, BoundedQueue, PriorityOrder};

/// Cloneable, lock-protected [`BoundedQueue`].
///
/// # Examples
///
/// ```
/// use prometheus_broker::core::SharedQueue;
/// use std::thread;
///
/// let q = SharedQueue::new(8);
/// let producer = {
///     let q = q.clone();
///     thread::spawn(move || {
///         for v in 0..4 {
///             q.push(v).unwrap();
///         }
///     })
/// };
/// producer.join().unwrap();
/// assert_eq!(q.snapshot(), vec![0, 1, 2, 3]);
/// ```
#[derive(Debug)]
pub struct SharedQueue<T> {
    inner: Arc<Mutex<BoundedQueue<T>>>,
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedQueue<T> {
    /// Create an empty shared queue of fixed `capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoundedQueue::new(capacity))),
        }
    }

    /// Enqueue at the tail.
    ///
    /// # Errors
    ///
    /// Returns the value back when the queue is full.
    pub fn push(&self, value: T) -> Result<(), T> {
        self.inner.lock().push(value)
    }

    /// Dequeue from the head.
    pub fn pull(&self) -> Option<T> {
        self.inner.lock().pull()
    }

    /// Remove the first element matching `pred`.
    pub fn remove_where<F>(&self, pred: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.inner.lock().remove_where(pred)
    }

    /// Run `f` with exclusive access to the queue, e.g. for a cursor walk.
    pub fn with<R>(&self, f: impl FnOnce(&mut BoundedQueue<T>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }
}

impl<T: PartialEq> SharedQueue<T> {
    /// Remove the first element equal to `value`.
    pub fn pop_value(&self, value: &T) -> Option<T> {
        self.inner.lock().pop_value(value)
    }
}

impl<T: Clone> SharedQueue<T> {
    /// Peek at a copy of the head.
    #[must_use]
    pub fn head(&self) -> Option<T> {
        self.inner.lock().head().cloned()
    }

    /// Copy of the elements in pull order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().snapshot()
    }

    /// Independent structural copy of the current contents.
    #[must_use]
    pub fn copy(&self) -> BoundedQueue<T> {
        self.inner.lock().clone()
    }
}

/// Cloneable, lock-protected [`BoundedPriorityQueue`].
#[derive(Debug)]
pub struct SharedPriorityQueue<T> {
    inner: Arc<Mutex<BoundedPriorityQueue<T>>>,
}

impl<T> Clone for SharedPriorityQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedPriorityQueue<T> {
    /// Create an empty shared priority queue.
    #[must_use]
    pub fn new(capacity: usize, order: PriorityOrder) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoundedPriorityQueue::new(capacity, order))),
        }
    }

    /// Insert at its priority position.
    ///
    /// # Errors
    ///
    /// Returns the value back when the queue is full.
    pub fn push(&self, priority: i64, value: T) -> Result<(), T> {
        self.inner.lock().push(priority, value)
    }

    /// Remove and return the first-served value.
    pub fn pull(&self) -> Option<T> {
        self.inner.lock().pull()
    }

    /// Remove and return the first-served value with its priority.
    pub fn pull_entry(&self) -> Option<(i64, T)> {
        self.inner.lock().pull_entry()
    }

    /// Run `f` with exclusive access to the queue.
    pub fn with<R>(&self, f: impl FnOnce(&mut BoundedPriorityQueue<T>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<T: PartialEq> SharedPriorityQueue<T> {
    /// Remove the first entry equal to `value`.
    pub fn pop_value(&self, value: &T) -> Option<(i64, T)> {
        self.inner.lock().pop_value(value)
    }
}

impl<T: Clone> SharedPriorityQueue<T> {
    /// Copy of the values in serving order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().snapshot()
    }
}
