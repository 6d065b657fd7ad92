//! Fixed-capacity slot arena shared by the bounded containers.
//!
//! Every slot lives in one boxed slice allocated at construction; nothing is
//! allocated or freed per element afterwards. The `next` links of all slots
//! form a single cycle: starting at `head`, the first `len` slots are the live
//! chain ending at `tail`, and the remaining `capacity - len` slots (reached
//! from `slots[tail].next`, or from `tail` itself when empty) are the free
//! chain. No separate free-list head is stored.
//!
//! ```text
//!   head                 tail    free chain ...............
//!    │                    │      │                         │
//!  ┌─▼─┐   ┌───┐   ┌───┐ ┌▼──┐  ┌▼──┐   ┌───┐   ┌───┐     │
//!  │ a ├──►│ b ├──►│ c ├►│ d ├─►│   ├──►│   ├──►│   ├──► (back to head)
//!  └───┘   └───┘   └───┘ └───┘  └───┘   └───┘   └───┘
//! ```
//!
//! Removing a live slot unlinks it and splices it straight after `tail`, so
//! the cycle is preserved by every operation.

/// Positional reference into a bounded container's live chain.
///
/// A cursor is two slot indices and a mutation stamp. It stays valid until the
/// container is structurally changed by anything other than
/// `remove_at` through this same cursor; a stale cursor is rejected (and
/// trips a debug assertion) instead of aliasing a reused slot.
#[derive(Debug, Clone)]
pub struct Cursor {
    previous: Option<usize>,
    current: Option<usize>,
    upcoming: Option<usize>,
    stamp: u64,
}

impl Cursor {
    /// Whether the element most recently yielded is still designated.
    #[must_use]
    pub const fn has_current(&self) -> bool {
        self.current.is_some()
    }

    /// Whether `advance` can yield another element.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.upcoming.is_none()
    }
}

#[derive(Debug, Clone)]
struct Slot<T, K> {
    value: Option<T>,
    key: K,
    next: usize,
}

/// Array-backed linked chain of `(key, value)` entries.
///
/// `K` is `()` for FIFO containers and the integer priority for ranked ones.
#[derive(Debug, Clone)]
pub(crate) struct Arena<T, K> {
    slots: Box<[Slot<T, K>]>,
    head: usize,
    tail: usize,
    len: usize,
    stamp: u64,
}

impl<T, K: Copy + Default> Arena<T, K> {
    pub(crate) fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|i| Slot {
                value: None,
                key: K::default(),
                next: (i + 1) % capacity,
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            head: 0,
            tail: 0,
            len: 0,
            stamp: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// First slot of the free chain. Only meaningful while not full.
    fn free_head(&self) -> usize {
        if self.len == 0 {
            self.tail
        } else {
            self.slots[self.tail].next
        }
    }

    fn bump(&mut self) {
        self.stamp = self.stamp.wrapping_add(1);
    }

    /// Write an entry into the free slot adjacent to tail.
    pub(crate) fn push_back(&mut self, key: K, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        let idx = self.free_head();
        if self.len > 0 {
            self.tail = idx;
        }
        let slot = &mut self.slots[idx];
        slot.value = Some(value);
        slot.key = key;
        self.len += 1;
        self.bump();
        Ok(())
    }

    /// Insert an entry so that it takes the chain position of `stop`.
    ///
    /// The first free slot is spliced in right after `stop` and receives the
    /// displaced entry; `stop` is then overwritten in place. Exactly two slots
    /// are written no matter where `stop` sits in the chain.
    pub(crate) fn insert_before(&mut self, stop: usize, key: K, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        debug_assert!(self.len > 0, "insert_before needs a live stop slot");
        debug_assert!(stop < self.capacity(), "slot index out of range");

        let free = self.slots[self.tail].next;
        self.slots[self.tail].next = self.slots[free].next;
        self.slots[free].next = self.slots[stop].next;
        self.slots[stop].next = free;
        if stop == self.tail {
            self.tail = free;
        }

        let displaced = self.slots[stop].value.replace(value);
        let displaced_key = std::mem::replace(&mut self.slots[stop].key, key);
        self.slots[free].value = displaced;
        self.slots[free].key = displaced_key;

        self.len += 1;
        self.bump();
        Ok(())
    }

    pub(crate) fn pop_front(&mut self) -> Option<(K, T)> {
        if self.len == 0 {
            return None;
        }
        let idx = self.head;
        let value = self.slots[idx].value.take()?;
        if self.len > 1 {
            // The old head already sits at the end of the free chain.
            self.head = self.slots[idx].next;
        }
        self.len -= 1;
        self.bump();
        Some((self.slots[idx].key, value))
    }

    /// Remove the live slot `idx` whose live predecessor is `prev`.
    fn unlink(&mut self, prev: Option<usize>, idx: usize) -> Option<(K, T)> {
        let Some(prev) = prev else {
            debug_assert_eq!(idx, self.head, "only the head has no predecessor");
            return self.pop_front();
        };
        debug_assert_eq!(self.slots[prev].next, idx, "predecessor link mismatch");

        let value = self.slots[idx].value.take()?;
        self.slots[prev].next = self.slots[idx].next;
        if idx == self.tail {
            self.tail = prev;
        }
        self.slots[idx].next = self.slots[self.tail].next;
        self.slots[self.tail].next = idx;

        self.len -= 1;
        self.bump();
        Some((self.slots[idx].key, value))
    }

    pub(crate) fn head(&self) -> Option<(K, &T)> {
        if self.len == 0 {
            return None;
        }
        let slot = &self.slots[self.head];
        slot.value.as_ref().map(|v| (slot.key, v))
    }

    /// Find the first live slot matching `pred`, with its live predecessor.
    fn locate<F>(&self, mut pred: F) -> Option<(Option<usize>, usize)>
    where
        F: FnMut(K, &T) -> bool,
    {
        let mut prev = None;
        let mut idx = self.head;
        for _ in 0..self.len {
            let slot = &self.slots[idx];
            if slot.value.as_ref().is_some_and(|v| pred(slot.key, v)) {
                return Some((prev, idx));
            }
            prev = Some(idx);
            idx = slot.next;
        }
        None
    }

    /// Slot index of the first live entry matching `pred`.
    pub(crate) fn position<F>(&self, pred: F) -> Option<usize>
    where
        F: FnMut(K, &T) -> bool,
    {
        self.locate(pred).map(|(_, idx)| idx)
    }

    pub(crate) fn remove_where<F>(&mut self, pred: F) -> Option<(K, T)>
    where
        F: FnMut(K, &T) -> bool,
    {
        let (prev, idx) = self.locate(pred)?;
        self.unlink(prev, idx)
    }

    pub(crate) fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        let mut idx = self.head;
        (0..self.len).filter_map(move |_| {
            let slot = &self.slots[idx];
            idx = slot.next;
            slot.value.as_ref().map(|v| (slot.key, v))
        })
    }

    pub(crate) const fn cursor(&self) -> Cursor {
        Cursor {
            previous: None,
            current: None,
            upcoming: if self.len > 0 { Some(self.head) } else { None },
            stamp: self.stamp,
        }
    }

    fn cursor_is_fresh(&self, cursor: &Cursor) -> bool {
        let fresh = cursor.stamp == self.stamp;
        debug_assert!(fresh, "stale cursor: container changed since the cursor was taken");
        fresh
    }

    pub(crate) fn advance(&self, cursor: &mut Cursor) -> Option<(K, &T)> {
        if !self.cursor_is_fresh(cursor) {
            return None;
        }
        let idx = cursor.upcoming?;
        // Indices are bounded by the arena, not by the live length.
        debug_assert!(idx < self.capacity(), "cursor index out of range");
        let slot = self.slots.get(idx)?;

        if cursor.current.is_some() {
            cursor.previous = cursor.current;
        }
        cursor.current = Some(idx);
        cursor.upcoming = if idx == self.tail { None } else { Some(slot.next) };
        slot.value.as_ref().map(|v| (slot.key, v))
    }

    pub(crate) fn remove_at(&mut self, cursor: &mut Cursor) -> Option<(K, T)> {
        if !self.cursor_is_fresh(cursor) {
            return None;
        }
        let idx = cursor.current.take()?;
        let removed = self.unlink(cursor.previous, idx);
        cursor.stamp = self.stamp;
        removed
    }

    /// Panics if the live/free partition of the slot cycle is broken.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let capacity = self.capacity();
        if capacity == 0 {
            assert_eq!(self.len, 0);
            return;
        }
        if self.len <= 1 {
            assert_eq!(self.head, self.tail, "head and tail must coincide");
        }

        let mut seen = vec![false; capacity];
        let mut idx = self.head;
        for step in 0..self.len {
            assert!(!seen[idx], "live chain revisits slot {idx}");
            seen[idx] = true;
            assert!(self.slots[idx].value.is_some(), "live slot {idx} is empty");
            if step + 1 == self.len {
                assert_eq!(idx, self.tail, "live chain does not end at tail");
            }
            idx = self.slots[idx].next;
        }

        let mut idx = self.free_head();
        for _ in 0..capacity - self.len {
            assert!(!seen[idx], "free chain revisits slot {idx}");
            seen[idx] = true;
            assert!(self.slots[idx].value.is_none(), "free slot {idx} holds a value");
            idx = self.slots[idx].next;
        }
        assert_eq!(idx, self.head, "slot cycle does not close at head");
    }
}
