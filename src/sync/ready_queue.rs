use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A lock-free multi-producer queue with capacity control.
///
/// Workers push the ids of runs whose forward outputs are ready; the driver
/// drains them, so concurrent publications are never coalesced.
pub struct ReadyQueue<T> {
    queue: SegQueue<T>,
    capacity: usize,
    size: AtomicUsize,
}

impl<T> ReadyQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: SegQueue::new(),
            capacity,
            size: AtomicUsize::new(0),
        }
    }

    /// Push an item, handing it back if the queue is at capacity
    pub fn push(&self, item: T) -> Result<(), T> {
        // Reserve a slot first so concurrent pushers cannot overshoot
        let reserved = self
            .size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| {
                (size < self.capacity).then_some(size + 1)
            });

        match reserved {
            Ok(_) => {
                self.queue.push(item);
                Ok(())
            }
            Err(_) => Err(item),
        }
    }

    pub fn pop(&self) -> Option<T> {
        let item = self.queue.pop()?;
        self.size.fetch_sub(1, Ordering::AcqRel);
        Some(item)
    }

    /// Pop everything currently queued, in FIFO order
    pub fn drain(&self) -> Vec<T> {
        std::iter::from_fn(|| self.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }
}
