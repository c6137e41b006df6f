//! Explicit pool of reusable chunk buffers
//!
//! Passed by `Arc` into whichever backend wants it instead of living in
//! thread-local or global state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Bounded stack of spare element buffers
pub struct BufferPool<E> {
    /// Spare buffers, most recently returned last
    spare: Mutex<Vec<Vec<E>>>,
    /// Maximum number of spare buffers kept
    capacity: usize,
    /// Number of `take` calls served from `spare`
    reused: AtomicU64,
}

impl<E: Clone> BufferPool<E> {
    /// Create a pool keeping at most `capacity` spare buffers
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of spare buffers; extra returns are dropped
    pub fn new(capacity: usize) -> Self {
        Self {
            spare: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            reused: AtomicU64::new(0),
        }
    }

    /// Get a buffer of `len` elements, all set to `fill`
    ///
    /// Reuses a spare buffer when one is available, otherwise allocates.
    ///
    /// # Arguments
    /// * `len` - Number of elements
    /// * `fill` - Value every element is reset to
    ///
    /// # Returns
    /// A buffer of exactly `len` elements, never stale data
    pub fn take(&self, len: usize, fill: &E) -> Vec<E> {
        let recycled = self
            .spare
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        match recycled {
            Some(mut buffer) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buffer.clear();
                buffer.resize(len, fill.clone());
                buffer
            }
            None => vec![fill.clone(); len],
        }
    }

    /// Return a buffer; dropped if the pool is full
    pub fn give(&self, buffer: Vec<E>) {
        let mut spare = self.spare.lock().unwrap_or_else(PoisonError::into_inner);
        if spare.len() < self.capacity {
            spare.push(buffer);
        }
    }

    /// Number of spare buffers currently held
    pub fn len(&self) -> usize {
        self.spare.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many `take` calls were served from a recycled buffer
    pub fn reuse_count(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_fresh_and_recycled() {
        let pool = BufferPool::new(2);
        let buffer = pool.take(4, &7u8);
        assert_eq!(buffer, vec![7, 7, 7, 7]);
        assert_eq!(pool.reuse_count(), 0);

        let mut dirty = buffer;
        dirty[0] = 1;
        pool.give(dirty);
        assert_eq!(pool.len(), 1);

        let again = pool.take(4, &0u8);
        assert_eq!(again, vec![0, 0, 0, 0]);
        assert_eq!(pool.reuse_count(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let pool = BufferPool::new(1);
        pool.give(vec![1i32]);
        pool.give(vec![2i32]);
        assert_eq!(pool.len(), 1);
    }
}
