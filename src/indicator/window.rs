use std::collections::VecDeque;

/// Fixed-capacity FIFO buffer. Pushing past capacity evicts the oldest value.
#[derive(Debug, Clone)]
pub struct FixedWindow<T = f64> {
    capacity: usize,
    buffer: VecDeque<T>,
}

impl<T: Clone> FixedWindow<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be > 0");
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T) {
        self.buffer.push_back(value);
        while self.buffer.len() > self.capacity {
            let _ = self.buffer.pop_front();
        }
    }

    /// Contents in insertion order, oldest first.
    pub fn values(&self) -> Vec<T> {
        self.buffer.iter().cloned().collect()
    }

    /// The most recent `n` values (or fewer), oldest first.
    pub fn tail(&self, n: usize) -> Vec<T> {
        let skip = self.buffer.len().saturating_sub(n);
        self.buffer.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.buffer.back()
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
