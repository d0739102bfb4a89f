//! Fixed-capacity circular queue.
//!
//! The ring is the only shared-memory primitive the harness relies on. Every
//! operation takes one short-lived lock, performs O(1) index arithmetic and
//! releases it again; fullness and emptiness are reported to the caller and
//! never waited on.

use parking_lot::Mutex;
use std::fmt;

struct RingState<T> {
    slots: Vec<Option<T>>,
    /// Next slot to write.
    head: usize,
    /// Next slot to read.
    tail: usize,
}

impl<T> RingState<T> {
    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn is_full(&self) -> bool {
        self.tail == self.advance(self.head)
    }

    fn len(&self) -> usize {
        (self.head + self.slots.len() - self.tail) % self.slots.len()
    }
}

/// Thread-safe bounded FIFO holding at most `capacity` items.
///
/// Storage is `capacity + 1` slots; the spare slot keeps `head == tail`
/// meaning "empty" and `advance(head) == tail` meaning "full".
pub struct RingBuffer<T> {
    capacity: usize,
    state: Mutex<RingState<T>>,
}

impl<T> RingBuffer<T> {
    /// Create an empty ring able to hold `capacity` items.
    ///
    /// A capacity of zero is accepted; such a ring rejects every push.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..=capacity).map(|_| None).collect();
        Self {
            capacity,
            state: Mutex::new(RingState {
                slots,
                head: 0,
                tail: 0,
            }),
        }
    }

    /// Append an item at the head.
    ///
    /// When the ring is full the item is handed back unchanged in `Err`.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.is_full() {
            return Err(item);
        }
        let head = state.head;
        state.slots[head] = Some(item);
        state.head = state.advance(head);
        Ok(())
    }

    /// Remove the oldest item, or `None` when the ring is empty.
    pub fn get(&self) -> Option<T> {
        let mut state = self.state.lock();
        if state.is_empty() {
            return None;
        }
        let tail = state.tail;
        let item = state.slots[tail].take();
        state.tail = state.advance(tail);
        item
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.state.lock().is_full()
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("len", &state.len())
            .field("head", &state.head)
            .field("tail", &state.tail)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_then_get_is_fifo() {
        let ring = RingBuffer::new(10);
        for i in 0..10 {
            assert!(ring.push(i).is_ok(), "push {} should succeed", i);
        }
        for expected in 0..10 {
            assert_eq!(ring.get(), Some(expected));
        }
    }

    #[test]
    fn test_push_fails_when_full() {
        let ring = RingBuffer::new(10);
        for i in 0..10 {
            ring.push(i).unwrap();
        }
        assert!(ring.is_full());
        for i in 0..10 {
            assert_eq!(ring.push(i), Err(i), "push into a full ring must fail");
        }
        assert_eq!(ring.len(), 10);
    }

    #[test]
    fn test_get_fails_when_empty() {
        let ring = RingBuffer::new(10);
        for i in 0..10 {
            ring.push(i).unwrap();
        }
        for _ in 0..10 {
            assert!(ring.get().is_some());
        }
        for _ in 0..10 {
            assert!(ring.get().is_none(), "get from an empty ring must fail");
        }
        assert!(ring.is_empty());
        assert!(ring.push(42).is_ok(), "drained ring accepts pushes again");
        assert_eq!(ring.get(), Some(42));
    }

    #[test]
    fn test_wraps_around_storage() {
        let ring = RingBuffer::new(3);
        for round in 0..10 {
            ring.push(round * 2).unwrap();
            ring.push(round * 2 + 1).unwrap();
            assert_eq!(ring.len(), 2);
            assert_eq!(ring.get(), Some(round * 2));
            assert_eq!(ring.get(), Some(round * 2 + 1));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let ring = RingBuffer::new(0);
        assert_eq!(ring.capacity(), 0);
        assert_eq!(ring.push("item"), Err("item"));
        assert_eq!(ring.get(), None);
    }

    #[test]
    fn test_concurrent_push_get_loses_nothing() {
        let ring = Arc::new(RingBuffer::new(64));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    let mut pending: Vec<usize> = (0..1000).map(|i| p * 1000 + i).collect();
                    while let Some(item) = pending.pop() {
                        if let Err(item) = ring.push(item) {
                            pending.push(item);
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let mut seen = HashSet::new();
        while seen.len() < 4000 {
            match ring.get() {
                Some(item) => assert!(seen.insert(item), "item {} delivered twice", item),
                None => thread::yield_now(),
            }
        }
        for producer in producers {
            producer.join().unwrap();
        }
        assert!(ring.is_empty());
    }
}
