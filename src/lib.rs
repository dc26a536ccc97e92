//! # tempstore
//!
//! Temporary off-heap storage for large immutable buffers:
//! - Size-classed pool of memory-mapped segments
//! - Write-once, read-many handles with an explicit state machine
//! - Segments unmapped as soon as their last region is released
//! - Blocking and background (deferred-completion) reads and writes
//! - Best-effort reclamation for handles dropped without `dispose()`
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TemporaryStorage                          │
//! │        create_storage · stats · sweep                        │
//! └───────┬──────────────────────┬───────────────────┬──────────┘
//!         │                      │                   │
//!         ▼                      ▼                   ▼
//!  ┌─────────────┐       ┌─────────────┐     ┌─────────────┐
//!  │StorageHandle│──────▶│  Executor   │     │  Reclaimer  │
//!  │Empty/Written│       │ (*_async)   │     │ (dropped    │
//!  │  /Disposed  │       └─────────────┘     │  handles)   │
//!  └──────┬──────┘                           └──────┬──────┘
//!         │  acquire / release                      │
//!         ▼                                         │
//!  ┌─────────────┐◀─────────────────────────────────┘
//!  │ SegmentPool │   per-class free lists
//!  └──────┬──────┘
//!         ▼
//!  ┌─────────────┐
//!  │   Segment   │   memmap2 mapping + views
//!  └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod cancel;
pub mod encoding;

pub mod segment;
pub mod pool;
pub mod handle;
pub mod executor;
mod reclaim;
pub mod service;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, StoreError};
pub use config::{Backing, StoreConfig};
pub use cancel::CancellationToken;
pub use encoding::{TextEncoding, Utf16Le, Utf8};
pub use executor::Completion;
pub use handle::{ContentStream, HandleState, StorageHandle};
pub use pool::{PoolStats, Region, SegmentPool};
pub use service::TemporaryStorage;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tempstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
