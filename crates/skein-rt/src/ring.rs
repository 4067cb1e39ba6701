// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Growable ring buffer backing a mailbox.

use std::collections::VecDeque;

/// FIFO buffer that starts at `initial` slots and doubles when full, never
/// past `max`.
pub(crate) struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    max: usize,
}

impl<T> RingBuffer<T> {
    pub(crate) fn new(initial: usize, max: usize) -> Self {
        let capacity = initial.clamp(1, max.max(1));
        Self { items: VecDeque::with_capacity(capacity), capacity, max: max.max(1) }
    }

    /// Hands the message back when the buffer is at its maximum size.
    pub(crate) fn push(&mut self, msg: T) -> Result<(), T> {
        if self.items.len() == self.capacity {
            if self.capacity == self.max {
                return Err(msg);
            }
            self.grow();
        }
        self.items.push_back(msg);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    fn grow(&mut self) {
        self.capacity = self.capacity.saturating_mul(2).min(self.max);
        let additional = self.capacity - self.items.len();
        self.items.reserve(additional);
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn has_space(&self) -> bool {
        self.items.len() < self.max
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn max(&self) -> usize {
        self.max
    }
}
