//! Bounded chunk of transformed items.

/// An ordered, bounded batch of items committed together.
///
/// `sequence` is the zero-based position of the chunk within its run. Sinks use
/// it to derive destination names that stay stable when a commit is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    sequence: usize,
    capacity: usize,
    items: Vec<T>,
}

impl<T> Chunk<T> {
    /// Create an empty chunk.
    pub fn new(sequence: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sequence,
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Build a chunk from existing items.
    pub fn from_items(sequence: usize, items: Vec<T>) -> Self {
        Self {
            sequence,
            capacity: items.len().max(1),
            items,
        }
    }

    /// Append an item. Callers check [`is_full`](Self::is_full) first.
    pub fn push(&mut self, item: T) {
        debug_assert!(!self.is_full(), "chunk {} overflow", self.sequence);
        self.items.push(item);
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<'a, T> IntoIterator for &'a Chunk<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_fills_to_capacity() {
        let mut chunk = Chunk::new(3, 2);
        assert!(chunk.is_empty());
        chunk.push("a");
        assert!(!chunk.is_full());
        chunk.push("b");
        assert!(chunk.is_full());
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.sequence(), 3);
        assert_eq!(chunk.items(), &["a", "b"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let chunk: Chunk<u8> = Chunk::new(0, 0);
        assert_eq!(chunk.capacity(), 1);
    }

    #[test]
    fn test_from_items() {
        let chunk = Chunk::from_items(1, vec![1, 2, 3]);
        assert!(chunk.is_full());
        assert_eq!(chunk.iter().sum::<i32>(), 6);
        assert_eq!(chunk.into_items(), vec![1, 2, 3]);
    }
}
