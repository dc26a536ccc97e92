//! Segment Module
//!
//! One fixed-capacity memory-mapped backing region.
//!
//! ## Responsibilities
//! - Own the OS mapping (anonymous or file-backed)
//! - Hand out byte views over sub-ranges
//! - Count live regions so the pool knows when to destroy it
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Segment (capacity bytes)                             │
//! │ ┌──────────┬──────────┬──────────┬─────┬──────────┐ │
//! │ │ block 0  │ block 1  │ block 2  │ ... │ block N  │ │
//! │ └──────────┴──────────┴──────────┴─────┴──────────┘ │
//! └──────────────────────────────────────────────────────┘
//! ```
//! Pooled segments are carved into equal blocks of their size class.
//! Dedicated segments hold exactly one region starting at offset 0.
//!
//! ## Concurrency
//! The mapping is shared between threads. Callers only ever touch the byte
//! range of a region they own, and the pool never hands the same range to
//! two live regions, so concurrent copies never overlap.

mod mapping;
mod view;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::Backing;
use crate::error::{Result, StoreError};

use mapping::Mapping;
pub use view::SegmentView;

/// A fixed-capacity memory-mapped region shared by one or more regions
pub struct Segment {
    /// Pool-unique id (also names the scratch file)
    id: u64,
    /// Mapped length in bytes
    capacity: usize,
    /// Start of the mapping, valid for the lifetime of `mapping`
    base: *mut u8,
    /// Number of regions currently carved out of this segment
    live_regions: AtomicUsize,
    mapping: Mapping,
}

// SAFETY: `base` points into `mapping`, which lives as long as the segment.
// All access goes through `read_at`/`write_at`, which bounds-check against
// `capacity`, and the pool guarantees that live regions never overlap.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Map a new segment of `capacity` bytes
    ///
    /// Mapping failures are reported as `ResourceExhausted`.
    pub fn create(id: u64, capacity: usize, backing: &Backing) -> Result<Self> {
        if capacity == 0 {
            return Err(StoreError::InvalidArgument(
                "segment capacity must be non-zero".to_string(),
            ));
        }

        let mut mapping = Mapping::create(id, capacity, backing)?;
        let base = mapping.base_ptr();

        tracing::debug!(segment = id, capacity, "segment mapped");

        Ok(Self {
            id,
            capacity,
            base,
            live_regions: AtomicUsize::new(0),
            mapping,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Scratch file backing this segment, if file-backed
    pub fn file_path(&self) -> Option<&Path> {
        self.mapping.file_path()
    }

    /// Number of live regions
    pub fn live_regions(&self) -> usize {
        self.live_regions.load(Ordering::Acquire)
    }

    /// Record one more live region
    pub fn retain(&self) {
        self.live_regions.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one live region; returns true if it was the last one
    pub fn release(&self) -> bool {
        let previous = self.live_regions.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "segment {} released more than retained", self.id);
        previous == 1
    }

    /// Random-access view over `[offset, offset + length)`
    pub fn create_view(self: &Arc<Self>, offset: usize, length: usize) -> Result<SegmentView> {
        let end = offset.checked_add(length);
        if end.map_or(true, |end| end > self.capacity) {
            return Err(StoreError::InvalidArgument(format!(
                "view [{}, +{}) exceeds segment {} capacity {}",
                offset, length, self.id, self.capacity
            )));
        }
        Ok(SegmentView::new(Arc::clone(self), offset, length))
    }

    /// Copy bytes out of the mapping starting at absolute `offset`
    pub(crate) fn read_at(&self, offset: usize, buf: &mut [u8]) {
        assert!(
            offset + buf.len() <= self.capacity,
            "read past end of segment {}",
            self.id
        );
        // SAFETY: bounds checked above; the range belongs to a region owned
        // by the caller, so no concurrent writer touches it.
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.add(offset), buf.as_mut_ptr(), buf.len());
        }
    }

    /// Copy bytes into the mapping starting at absolute `offset`
    pub(crate) fn write_at(&self, offset: usize, data: &[u8]) {
        assert!(
            offset + data.len() <= self.capacity,
            "write past end of segment {}",
            self.id
        );
        // SAFETY: bounds checked above; the range belongs to a region owned
        // exclusively by the caller.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.base.add(offset), data.len());
        }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        tracing::debug!(segment = self.id, capacity = self.capacity, "segment unmapped");
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("live_regions", &self.live_regions())
            .finish()
    }
}
