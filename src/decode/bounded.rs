//! Capacity-bounded append buffer shared by concurrent decode workers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::detection::{Detection, RawPredictions};

/// Fixed set of write-once slots behind a saturating atomic counter.
///
/// Producers reserve a slot with a compare-and-swap that refuses to move the
/// counter past capacity, then fill the reserved slot. Which producers win
/// when more candidates arrive than fit is decided by commit order, not by
/// scan order.
pub struct BoundedOutput {
    slots: Box<[OnceLock<Detection>]>,
    next: AtomicUsize,
    dropped: AtomicUsize,
}

impl BoundedOutput {
    /// Creates an empty buffer with `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| OnceLock::new()).collect();
        Self {
            slots,
            next: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Appends `det` if a slot is free; returns false once the buffer is full.
    pub fn try_push(&self, det: Detection) -> bool {
        let capacity = self.slots.len();
        let reserved = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            });
        match reserved {
            Ok(idx) => match self.slots.get(idx) {
                Some(slot) => slot.set(det).is_ok(),
                None => false,
            },
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Number of reserved slots; never exceeds capacity.
    pub fn len(&self) -> usize {
        self.next.load(Ordering::Acquire)
    }

    /// Returns true when nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slot count.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when every slot is reserved.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Number of candidates rejected because the buffer was full.
    ///
    /// This is a lower bound on the true overflow: decode workers stop
    /// scanning once the buffer is full, so candidates in skipped rows are
    /// never offered and never counted.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Collects the committed candidates in slot order.
    pub fn into_raw(self) -> RawPredictions {
        let capacity = self.slots.len();
        let count = self.next.into_inner().min(capacity);
        let items = self
            .slots
            .into_vec()
            .into_iter()
            .take(count)
            .filter_map(OnceLock::into_inner)
            .collect();
        RawPredictions::new(items, capacity)
    }
}
