//! Size classes
//!
//! Each class owns the list of live segments carved into blocks of its size.
//! The class mutex covers only this bookkeeping; byte copies happen outside.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::segment::Segment;

/// Index of the class serving `size`, or None if it needs a dedicated segment
///
/// Classes double from `min_block` (class 0) up to `max_block`.
pub(super) fn class_index(size: usize, min_block: usize, max_block: usize) -> Option<usize> {
    if size > max_block {
        return None;
    }
    let rounded = size.max(min_block).next_power_of_two();
    Some((rounded.trailing_zeros() - min_block.trailing_zeros()) as usize)
}

/// A live segment plus the blocks in it nobody holds
struct PooledSegment {
    segment: Arc<Segment>,
    free_blocks: Vec<u32>,
}

pub(super) struct SizeClass {
    block_size: usize,
    segment_capacity: usize,
    segments: Mutex<Vec<PooledSegment>>,
}

impl SizeClass {
    pub(super) fn new(block_size: usize, configured_capacity: usize) -> Self {
        let blocks = (configured_capacity / block_size).clamp(1, u32::MAX as usize);
        Self {
            block_size,
            segment_capacity: blocks * block_size,
            segments: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn block_size(&self) -> usize {
        self.block_size
    }

    pub(super) fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    pub(super) fn blocks_per_segment(&self) -> u32 {
        (self.segment_capacity / self.block_size) as u32
    }

    /// Take a free block from the first segment that has one
    ///
    /// The segment is retained before the lock is dropped.
    pub(super) fn take_block(&self) -> Option<(Arc<Segment>, u32)> {
        let mut segments = self.segments.lock();
        segments.iter_mut().find_map(|pooled| {
            let block = pooled.free_blocks.pop()?;
            pooled.segment.retain();
            Some((Arc::clone(&pooled.segment), block))
        })
    }

    /// Add a freshly mapped segment and take its first block
    pub(super) fn insert_segment(&self, segment: Arc<Segment>) -> u32 {
        // Lowest blocks are handed out first.
        let free_blocks = (1..self.blocks_per_segment()).rev().collect();
        segment.retain();
        self.segments.lock().push(PooledSegment {
            segment: Arc::clone(&segment),
            free_blocks,
        });
        0
    }

    /// Give a block back
    ///
    /// Returns the segment if that was its last live region. It is already
    /// unlinked from the class; dropping it unmaps it.
    pub(super) fn return_block(&self, segment: &Arc<Segment>, block: u32) -> Option<Arc<Segment>> {
        let mut segments = self.segments.lock();
        let index = segments
            .iter()
            .position(|pooled| pooled.segment.id() == segment.id())?;

        segments[index].free_blocks.push(block);
        if segments[index].segment.release() {
            let pooled = segments.swap_remove(index);
            return Some(pooled.segment);
        }
        None
    }

    /// Number of live segments in this class
    pub(super) fn segment_count(&self) -> usize {
        self.segments.lock().len()
    }
}
