//! Fixed-capacity ring buffer that keeps the newest items
//!
//! Pushing into a full buffer evicts the oldest item. Logical index 0 is
//! always the oldest retained item.
//!
//! # Usage
//!
//! ```rust
//! use uvc_stream::ring_buffer::SampleRingBuffer;
//!
//! let mut ring = SampleRingBuffer::new(2).unwrap();
//! for i in 1..=5 {
//!     ring.push(i);
//! }
//! assert_eq!(ring.to_vec(), vec![4, 5]);
//! ```

use std::collections::vec_deque::{self, VecDeque};
use thiserror::Error;

/// Errors produced by [`SampleRingBuffer`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
    /// A ring buffer needs room for at least one item.
    #[error("ring buffer capacity must be at least 1")]
    ZeroCapacity,

    /// Logical index is not below the current length.
    #[error("index {index} out of range for ring buffer of length {len}")]
    IndexOutOfRange {
        /// Index requested.
        index: usize,
        /// Items currently retained.
        len: usize,
    },
}

/// Bounded FIFO that overwrites its oldest item when full
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> SampleRingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items
    ///
    /// # Errors
    ///
    /// Returns [`RingBufferError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append `item`, returning the evicted oldest item if the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Item at logical index (0 = oldest)
    ///
    /// # Errors
    ///
    /// Returns [`RingBufferError::IndexOutOfRange`] if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<&T, RingBufferError> {
        self.items.get(index).ok_or(RingBufferError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    /// Remove and return the oldest item
    pub fn pop_oldest(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Items currently retained
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items are retained
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the next push will evict
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Fixed capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all retained items
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Clone> SampleRingBuffer<T> {
    /// Retained items, oldest to newest
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a SampleRingBuffer<T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            SampleRingBuffer::<u8>::new(0),
            Err(RingBufferError::ZeroCapacity)
        );
    }

    #[test]
    fn test_capacity_two_keeps_newest() {
        let mut ring = SampleRingBuffer::new(2).unwrap();
        for i in 1..=5 {
            ring.push(i);
        }
        assert_eq!(ring.to_vec(), vec![4, 5]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_capacity_one() {
        let mut ring = SampleRingBuffer::new(1).unwrap();
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), Some(1));
        assert_eq!(ring.get(0), Ok(&2));
    }

    #[test]
    fn test_overflow_retains_newest_in_order() {
        for capacity in 1..6 {
            let mut ring = SampleRingBuffer::new(capacity).unwrap();
            let pushed = capacity * 3 + 1;
            for i in 0..pushed {
                ring.push(i);
            }
            assert_eq!(ring.len(), capacity);
            assert_eq!(ring.get(0), Ok(&(pushed - capacity)));
            let expected: Vec<_> = (pushed - capacity..pushed).collect();
            assert_eq!(ring.to_vec(), expected);
        }
    }

    #[test]
    fn test_get_out_of_range() {
        let mut ring = SampleRingBuffer::new(3).unwrap();
        assert_eq!(
            ring.get(0),
            Err(RingBufferError::IndexOutOfRange { index: 0, len: 0 })
        );
        ring.push('a');
        ring.push('b');
        assert_eq!(ring.get(1), Ok(&'b'));
        assert_eq!(
            ring.get(2),
            Err(RingBufferError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let mut ring = SampleRingBuffer::new(2).unwrap();
        ring.push(vec![1u8]);
        let copy = ring.clone();
        ring.push(vec![2]);
        ring.push(vec![3]);

        assert_eq!(copy.to_vec(), vec![vec![1]]);
        assert_eq!(ring.to_vec(), vec![vec![2], vec![3]]);
        assert_eq!(copy.capacity(), 2);
    }

    #[test]
    fn test_pop_and_clear() {
        let mut ring = SampleRingBuffer::new(3).unwrap();
        ring.push(1);
        ring.push(2);
        assert!(!ring.is_full());
        assert_eq!(ring.pop_oldest(), Some(1));
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.pop_oldest(), None);
        assert_eq!(ring.capacity(), 3);
    }

    #[test]
    fn test_iter_order() {
        let mut ring = SampleRingBuffer::new(3).unwrap();
        for i in 0..5 {
            ring.push(i);
        }
        let seen: Vec<_> = (&ring).into_iter().copied().collect();
        assert_eq!(seen, vec![2, 3, 4]);
    }
}
