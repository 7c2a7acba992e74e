//! Scoped ownership of large buffers: spooled upload bytes and page rasters.
//!
//! Every buffer the pipeline allocates on behalf of an upload is wrapped in a
//! [`Tracked`] guard registered with a [`BufferLedger`]. The guard releases
//! the buffer and deregisters it in `Drop`, so release happens exactly once on
//! every path: success, early `?` return, a panic unwinding through the
//! pipeline, or a caller dropping the scan future half-way through a batch.
//!
//! The ledger is only a pair of counters. It makes the "nothing is left
//! behind" property observable from tests and from logs.

use crate::pipeline::Page;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Anything whose heap footprint the ledger should account for.
pub trait BufferSize {
    fn buffer_size(&self) -> usize;
}

impl BufferSize for Vec<u8> {
    fn buffer_size(&self) -> usize {
        self.len()
    }
}

impl BufferSize for Page {
    fn buffer_size(&self) -> usize {
        self.image().as_bytes().len()
    }
}

#[derive(Debug, Default)]
struct LedgerCounts {
    live: AtomicUsize,
    bytes: AtomicUsize,
}

/// Counts buffers currently held by the pipeline. Clones share the counters.
#[derive(Debug, Clone, Default)]
pub struct BufferLedger {
    counts: Arc<LedgerCounts>,
}

impl BufferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `value` and register it as live.
    pub fn track<T: BufferSize>(&self, value: T) -> Tracked<T> {
        let size = value.buffer_size();
        self.counts.live.fetch_add(1, Ordering::SeqCst);
        self.counts.bytes.fetch_add(size, Ordering::SeqCst);
        Tracked {
            value,
            size,
            ledger: self.clone(),
        }
    }

    /// Number of tracked buffers not yet released.
    pub fn live(&self) -> usize {
        self.counts.live.load(Ordering::SeqCst)
    }

    /// Total bytes held by tracked buffers not yet released.
    pub fn live_bytes(&self) -> usize {
        self.counts.bytes.load(Ordering::SeqCst)
    }

    fn release(&self, size: usize) {
        self.counts.live.fetch_sub(1, Ordering::SeqCst);
        self.counts.bytes.fetch_sub(size, Ordering::SeqCst);
    }
}

/// A buffer owned by the pipeline. Dropping it releases the buffer.
#[derive(Debug)]
pub struct Tracked<T> {
    value: T,
    size: usize,
    ledger: BufferLedger,
}

impl<T> Tracked<T> {
    /// Byte size recorded when the buffer was registered.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.ledger.release(self.size);
    }
}

/// Spooled upload bytes.
pub type Spool = Tracked<Vec<u8>>;
