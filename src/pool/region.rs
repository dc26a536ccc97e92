//! Region
//!
//! The piece of a segment assigned to one storage handle.

use std::sync::Arc;

use crate::error::Result;
use crate::segment::{Segment, SegmentView};

/// Where a region came from, so it can be returned to the right place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Block `block` of a pooled segment in size class `class`
    Pooled { class: usize, block: u32 },
    /// Whole dedicated segment
    Dedicated,
}

/// A sub-range of a segment owned by exactly one holder
///
/// Not `Clone`: releasing consumes it, so it cannot be released twice.
#[derive(Debug)]
pub struct Region {
    segment: Arc<Segment>,
    offset: usize,
    len: usize,
    placement: Placement,
}

impl Region {
    pub(crate) fn new(segment: Arc<Segment>, offset: usize, len: usize, placement: Placement) -> Self {
        Self {
            segment,
            offset,
            len,
            placement,
        }
    }

    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if this region has a segment to itself
    pub fn is_dedicated(&self) -> bool {
        self.placement == Placement::Dedicated
    }

    pub(crate) fn placement(&self) -> Placement {
        self.placement
    }

    /// Fresh cursor over this region's bytes
    pub fn view(&self) -> Result<SegmentView> {
        self.segment.create_view(self.offset, self.len)
    }
}
