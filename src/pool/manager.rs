//! Segment Pool
//!
//! Hands out regions from size-classed segments and destroys segments as soon
//! as their last region comes back.
//!
//! ## Responsibilities
//! - Round requests up to a size class
//! - Reuse spare blocks before mapping new segments
//! - Map dedicated segments for oversized requests
//! - Track mapped bytes and segment lifecycle

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::config::{Backing, StoreConfig};
use crate::error::{Result, StoreError};
use crate::segment::Segment;

use super::region::{Placement, Region};
use super::size_class::{class_index, SizeClass};
use super::PoolStats;

/// Size-classed pool of memory-mapped segments
///
/// ## Concurrency:
/// - Each size class has its own mutex over its segment list
/// - Mapping, unmapping and byte copies happen outside every lock
/// - Counters are atomics (lock-free)
/// - All methods use `&self`
pub struct SegmentPool {
    /// Classes ordered by block size, smallest first
    classes: Vec<SizeClass>,

    min_block_size: usize,
    max_block_size: usize,

    backing: Backing,

    /// Next ID for new segments (atomic, lock-free)
    next_segment_id: AtomicU64,

    counters: Counters,
}

#[derive(Default)]
struct Counters {
    live_segments: AtomicUsize,
    mapped_bytes: AtomicUsize,
    live_regions: AtomicUsize,
    segments_created: AtomicU64,
    segments_destroyed: AtomicU64,
    regions_reclaimed: AtomicU64,
}

impl SegmentPool {
    /// Build an empty pool
    ///
    /// Fails with `Config` if the size-class layout is invalid.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let mut classes = Vec::new();
        let mut next = Some(config.min_block_size);
        while let Some(block_size) = next.filter(|&size| size <= config.max_block_size) {
            classes.push(SizeClass::new(block_size, config.segment_capacity));
            next = block_size.checked_mul(2);
        }

        Ok(Self {
            classes,
            min_block_size: config.min_block_size,
            max_block_size: config.max_block_size,
            backing: config.backing.clone(),
            next_segment_id: AtomicU64::new(1),
            counters: Counters::default(),
        })
    }

    /// Allocate a region of `size_hint` bytes
    ///
    /// Cancellation is honored up to the point a new mapping would be created.
    /// After that the allocation always completes.
    pub fn acquire_region(&self, size_hint: usize, cancel: &CancellationToken) -> Result<Region> {
        if size_hint == 0 {
            return Err(StoreError::InvalidArgument(
                "cannot allocate a zero-length region".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let region = match class_index(size_hint, self.min_block_size, self.max_block_size) {
            Some(index) => self.acquire_pooled(index, size_hint, cancel)?,
            None => self.acquire_dedicated(size_hint, cancel)?,
        };

        self.counters.live_regions.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(
            segment = region.segment().id(),
            offset = region.offset(),
            len = region.len(),
            "region acquired"
        );
        Ok(region)
    }

    /// Return a region to the pool
    ///
    /// Destroys the owning segment if this was its last live region.
    pub fn release_region(&self, region: Region) {
        tracing::trace!(
            segment = region.segment().id(),
            offset = region.offset(),
            len = region.len(),
            "region released"
        );
        self.counters.live_regions.fetch_sub(1, Ordering::AcqRel);

        let destroyed = match region.placement() {
            Placement::Pooled { class, block } => {
                self.classes[class].return_block(region.segment(), block)
            }
            Placement::Dedicated => {
                if region.segment().release() {
                    Some(Arc::clone(region.segment()))
                } else {
                    None
                }
            }
        };

        if let Some(segment) = destroyed {
            self.counters.live_segments.fetch_sub(1, Ordering::AcqRel);
            self.counters
                .mapped_bytes
                .fetch_sub(segment.capacity(), Ordering::AcqRel);
            self.counters.segments_destroyed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(segment = segment.id(), "segment retired");
        }
        // The region's Arc goes last; with it the mapping is unmapped.
    }

    /// Release a region on behalf of a handle that was never disposed
    pub(crate) fn reclaim_region(&self, region: Region) {
        self.counters.regions_reclaimed.fetch_add(1, Ordering::Relaxed);
        self.release_region(region);
    }

    /// Snapshot of pool counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live_segments: self.counters.live_segments.load(Ordering::Acquire),
            mapped_bytes: self.counters.mapped_bytes.load(Ordering::Acquire),
            live_regions: self.counters.live_regions.load(Ordering::Acquire),
            segments_created: self.counters.segments_created.load(Ordering::Relaxed),
            segments_destroyed: self.counters.segments_destroyed.load(Ordering::Relaxed),
            regions_reclaimed: self.counters.regions_reclaimed.load(Ordering::Relaxed),
        }
    }

    /// Block size of the class serving `size`, or None if oversized
    pub fn block_size_for(&self, size: usize) -> Option<usize> {
        class_index(size, self.min_block_size, self.max_block_size)
            .map(|index| self.classes[index].block_size())
    }

    /// (block size, segment capacity, live segments) per class
    pub fn class_layout(&self) -> Vec<(usize, usize, usize)> {
        self.classes
            .iter()
            .map(|c| (c.block_size(), c.segment_capacity(), c.segment_count()))
            .collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn acquire_pooled(&self, index: usize, size: usize, cancel: &CancellationToken) -> Result<Region> {
        let class = &self.classes[index];
        let block_size = class.block_size();

        if let Some((segment, block)) = class.take_block() {
            let offset = block as usize * block_size;
            return Ok(Region::new(segment, offset, size, Placement::Pooled { class: index, block }));
        }

        // No spare block: map a new segment for this class.
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let segment = self.map_segment(class.segment_capacity())?;
        let block = class.insert_segment(Arc::clone(&segment));
        let offset = block as usize * block_size;

        Ok(Region::new(segment, offset, size, Placement::Pooled { class: index, block }))
    }

    fn acquire_dedicated(&self, size: usize, cancel: &CancellationToken) -> Result<Region> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let segment = self.map_segment(size)?;
        segment.retain();
        Ok(Region::new(segment, 0, size, Placement::Dedicated))
    }

    fn map_segment(&self, capacity: usize) -> Result<Arc<Segment>> {
        // Generate new segment ID (atomic, lock-free)
        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let segment = Segment::create(id, capacity, &self.backing)?;

        self.counters.live_segments.fetch_add(1, Ordering::AcqRel);
        self.counters.mapped_bytes.fetch_add(capacity, Ordering::AcqRel);
        self.counters.segments_created.fetch_add(1, Ordering::Relaxed);

        Ok(Arc::new(segment))
    }
}
