//! Owned, contiguous storage with doubling growth.
//!
//! [`GrowableBuffer`] backs the three per-process streams of the previewer: the
//! diagnostic log, the watched file's bytes, and the overlay vertex list. It is
//! a thin layer over `Vec<T>` that pins the growth policy down explicitly:
//! capacity doubles (starting at 1) whenever a push finds the buffer full, and
//! [`clear`](GrowableBuffer::clear) keeps the allocation around for the next
//! frame.
//!
//! Allocation failure aborts the process, like every other `Vec` growth in Rust.
//! Use [`try_ensure`](GrowableBuffer::try_ensure) where a recoverable error is
//! preferred.

use std::collections::TryReserveError;
use std::io;
use std::ops::Deref;

/// A growable buffer with amortized O(1) `push_back`.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowableBuffer<T> {
    items: Vec<T>,
}

impl<T> Default for GrowableBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> GrowableBuffer<T> {
    /// Create an empty buffer. Nothing is allocated until the first push.
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Number of elements in use.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of elements the current allocation can hold.
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Grow the allocation to hold at least `min_capacity` elements.
    ///
    /// Existing elements are preserved. Does nothing if the buffer is already
    /// large enough.
    pub fn ensure(&mut self, min_capacity: usize) {
        if self.capacity() < min_capacity {
            self.grow_to(min_capacity);
        }
    }

    /// Like [`ensure`](Self::ensure), but reports allocation failure instead
    /// of aborting.
    pub fn try_ensure(&mut self, min_capacity: usize) -> Result<(), TryReserveError> {
        if self.capacity() < min_capacity {
            self.items
                .try_reserve_exact(min_capacity - self.items.len())?;
        }
        Ok(())
    }

    /// Append an item, doubling the capacity first if the buffer is full.
    pub fn push_back(&mut self, item: T) {
        if self.items.len() == self.items.capacity() {
            let doubled = self.capacity().saturating_mul(2).max(1);
            self.grow_to(doubled);
        }
        self.items.push(item);
    }

    /// Reset the length to zero. The allocation is retained.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Release the storage. The buffer is consumed.
    pub fn free(self) {
        drop(self);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    // Vec::reserve_exact takes the additional count relative to len, not capacity.
    fn grow_to(&mut self, new_capacity: usize) {
        self.items.reserve_exact(new_capacity - self.items.len());
    }
}

impl<T: Clone> GrowableBuffer<T> {
    /// Append every element of `items`, doubling as often as needed.
    pub fn extend_from_slice(&mut self, items: &[T]) {
        let needed = self.items.len() + items.len();
        if needed > self.capacity() {
            let mut capacity = self.capacity().max(1);
            while capacity < needed {
                capacity = capacity.saturating_mul(2);
            }
            self.grow_to(capacity);
        }
        self.items.extend_from_slice(items);
    }
}

impl<T> Deref for GrowableBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl io::Write for GrowableBuffer<u8> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn push_back_preserves_order_across_growth() {
        let mut buffer = GrowableBuffer::new();
        for i in 0..1000u32 {
            buffer.push_back(i);
            assert_eq!(buffer.len(), i as usize + 1);
        }

        for (i, value) in buffer.iter().enumerate() {
            assert_eq!(*value, i as u32);
        }
        assert!(buffer.len() <= buffer.capacity());
    }

    #[test]
    fn push_back_doubles_capacity() {
        let mut buffer = GrowableBuffer::new();
        assert_eq!(buffer.capacity(), 0);

        let mut seen = Vec::new();
        for i in 0..9u64 {
            buffer.push_back(i);
            if seen.last() != Some(&buffer.capacity()) {
                seen.push(buffer.capacity());
            }
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut buffer = GrowableBuffer::new();
        for i in 0..37u16 {
            buffer.push_back(i);
        }
        let capacity = buffer.capacity();

        buffer.clear();
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= capacity);
    }

    #[test]
    fn ensure_within_capacity_does_not_reallocate() {
        let mut buffer = GrowableBuffer::new();
        buffer.ensure(64);
        buffer.push_back(7u8);
        let ptr = buffer.as_slice().as_ptr();
        let capacity = buffer.capacity();

        buffer.clear();
        buffer.ensure(capacity);
        buffer.ensure(1);
        buffer.push_back(9);

        assert_eq!(buffer.as_slice().as_ptr(), ptr);
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn ensure_preserves_contents() {
        let mut buffer = GrowableBuffer::new();
        buffer.extend_from_slice(b"hello");
        buffer.ensure(4096);

        assert!(buffer.capacity() >= 4096);
        assert_eq!(buffer.as_slice(), b"hello");
    }

    #[test]
    fn try_ensure_grows() {
        let mut buffer: GrowableBuffer<u32> = GrowableBuffer::new();
        buffer.try_ensure(10).unwrap();
        assert!(buffer.capacity() >= 10);
        assert!(buffer.try_ensure(usize::MAX).is_err());
    }

    #[test]
    fn write_appends_bytes() {
        let mut log = GrowableBuffer::new();
        write!(log, "error: {}", 42).unwrap();
        log.write_all(b"\nsecond line").unwrap();

        assert_eq!(log.as_slice(), b"error: 42\nsecond line");
    }
}
