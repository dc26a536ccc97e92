//! Pool Module
//!
//! Size-classed collection of segments that regions are carved from.
//!
//! ## Size Classes
//! ```text
//! class 0:  4 KB blocks ── segments of 4 MB (1024 blocks)
//! class 1:  8 KB blocks ── segments of 4 MB (512 blocks)
//!   ...
//! class 9:  2 MB blocks ── segments of 4 MB (2 blocks)
//! > 2 MB:   dedicated segment sized exactly to the request
//! ```
//! Boundaries come from [`StoreConfig`](crate::StoreConfig); the numbers
//! above are the defaults.
//!
//! ## Reclamation
//! A segment is unmapped as soon as its last region is released, so mapped
//! memory tracks the live working set rather than allocation history.

mod manager;
mod region;
mod size_class;

pub use manager::SegmentPool;
pub use region::Region;

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Segments currently mapped
    pub live_segments: usize,

    /// Total bytes currently mapped across all segments
    pub mapped_bytes: usize,

    /// Regions currently held by handles
    pub live_regions: usize,

    /// Segments mapped over the pool's lifetime
    pub segments_created: u64,

    /// Segments unmapped over the pool's lifetime
    pub segments_destroyed: u64,

    /// Regions released by the reclaimer rather than by `dispose`
    pub regions_reclaimed: u64,
}
